use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One committed entry of bytes consumed at a point in time.
///
/// Records are immutable once appended; per-user history is insertion-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Bytes consumed during the session that produced this record.
    pub usage: f64,
}

/// A tracked user and their durable usage totals.
///
/// Byte quantities are `f64` throughout: manual entries convert fractional
/// KB/MB/GB amounts into sub-byte values, and the formatter has a dedicated
/// sub-byte display path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub total_usage: f64,
    pub usage_history: Vec<UsageRecord>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            total_usage: 0.0,
            usage_history: Vec::new(),
        }
    }

    /// Sum of all recorded usage. Equals `total_usage` for any user the
    /// repository hands out.
    pub fn history_total(&self) -> f64 {
        self.usage_history.iter().map(|record| record.usage).sum()
    }
}

pub const BYTE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

pub const DEFAULT_DECIMALS: u32 = 2;

/// Formats a byte count for totals/list display.
///
/// Anything below one byte, zero and negatives included, collapses to
/// `"0 Bytes"`. Use [`format_bytes_live`] where sub-byte values must stay
/// visible.
pub fn format_bytes(bytes: f64, decimals: u32) -> String {
    if !bytes.is_finite() || bytes < 1.0 {
        return "0 Bytes".to_string();
    }
    format_scaled(bytes, decimals)
}

/// Formats a byte count for live session display.
///
/// `<= 0` renders `"0 Bytes"`, but values between zero and one byte keep
/// their fixed precision (`"0.50 Bytes"`) so small manual entries do not
/// vanish from the running counter.
pub fn format_bytes_live(bytes: f64, decimals: u32) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 Bytes".to_string();
    }
    if bytes < 1.0 {
        return format!("{:.*} Bytes", decimals as usize, bytes);
    }
    format_scaled(bytes, decimals)
}

fn format_scaled(bytes: f64, decimals: u32) -> String {
    let exponent = (bytes.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(BYTE_UNITS.len() - 1);
    let value = bytes / 1024_f64.powi(exponent as i32);
    format!(
        "{} {}",
        trim_trailing_zeros(value, decimals),
        BYTE_UNITS[exponent]
    )
}

fn trim_trailing_zeros(value: f64, decimals: u32) -> String {
    let formatted = format!("{:.*}", decimals as usize, value);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Unit selector for manual usage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualUnit {
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl ManualUnit {
    pub fn multiplier(self) -> f64 {
        match self {
            ManualUnit::Kilobytes => 1024.0,
            ManualUnit::Megabytes => 1024.0 * 1024.0,
            ManualUnit::Gigabytes => 1024.0 * 1024.0 * 1024.0,
        }
    }

    pub fn to_bytes(self, amount: f64) -> f64 {
        amount * self.multiplier()
    }

    pub fn label(self) -> &'static str {
        match self {
            ManualUnit::Kilobytes => "KB",
            ManualUnit::Megabytes => "MB",
            ManualUnit::Gigabytes => "GB",
        }
    }
}

impl fmt::Display for ManualUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ManualUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "KB" => Ok(ManualUnit::Kilobytes),
            "MB" => Ok(ManualUnit::Megabytes),
            "GB" => Ok(ManualUnit::Gigabytes),
            other => Err(format!("unknown unit: {other} (expected KB, MB or GB)")),
        }
    }
}

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// The fixed demo dataset used when no persisted state exists yet.
///
/// Record timestamps are spread over the days preceding `now_ms`; totals are
/// derived from the records so the total/history invariant holds from the
/// first load.
pub fn seed_users(now_ms: i64) -> Vec<User> {
    let mib = |value: f64| value * 1024.0 * 1024.0;
    vec![
        seeded_user(
            "1",
            "Alice",
            &[
                (now_ms - 6 * DAY_MS, mib(20.0)),
                (now_ms - 5 * DAY_MS, mib(35.0)),
                (now_ms - 3 * DAY_MS, mib(15.0)),
                (now_ms - DAY_MS, 87_286_400.0),
            ],
        ),
        seeded_user(
            "2",
            "Bob",
            &[
                (now_ms - 7 * DAY_MS, mib(50.0)),
                (now_ms - 4 * DAY_MS, mib(120.0)),
                (now_ms - 2 * DAY_MS, mib(80.0)),
                (now_ms, 127_487_360.0),
            ],
        ),
        seeded_user(
            "3",
            "Charlie",
            &[
                (now_ms - 10 * DAY_MS, 1_610_612_736.0),
                (now_ms - 5 * DAY_MS, 1_073_741_824.0),
            ],
        ),
        seeded_user(
            "4",
            "Dana",
            &[
                (now_ms - 20 * DAY_MS, 879_609_302_221.0),
                (now_ms - 10 * DAY_MS, 439_804_651_110.0),
            ],
        ),
    ]
}

fn seeded_user(id: &str, name: &str, records: &[(i64, f64)]) -> User {
    let usage_history: Vec<UsageRecord> = records
        .iter()
        .map(|&(timestamp, usage)| UsageRecord { timestamp, usage })
        .collect();
    let total_usage = usage_history.iter().map(|record| record.usage).sum();
    User {
        id: id.to_string(),
        name: name.to_string(),
        total_usage,
        usage_history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_zero_and_negative_collapse() {
        assert_eq!(format_bytes(0.0, DEFAULT_DECIMALS), "0 Bytes");
        assert_eq!(format_bytes(-5.0, DEFAULT_DECIMALS), "0 Bytes");
        assert_eq!(format_bytes(f64::NAN, DEFAULT_DECIMALS), "0 Bytes");
    }

    #[test]
    fn format_bytes_collapses_sub_byte_values() {
        // List-view policy: anything below one byte is shown as zero.
        assert_eq!(format_bytes(0.5, DEFAULT_DECIMALS), "0 Bytes");
    }

    #[test]
    fn format_bytes_live_keeps_sub_byte_values() {
        assert_eq!(format_bytes_live(0.5, DEFAULT_DECIMALS), "0.50 Bytes");
        assert_eq!(format_bytes_live(0.512, 3), "0.512 Bytes");
        assert_eq!(format_bytes_live(0.0, DEFAULT_DECIMALS), "0 Bytes");
        assert_eq!(format_bytes_live(-1.0, DEFAULT_DECIMALS), "0 Bytes");
    }

    #[test]
    fn format_bytes_picks_units_at_1024_boundaries() {
        assert_eq!(format_bytes(1.0, DEFAULT_DECIMALS), "1 Bytes");
        assert_eq!(format_bytes(1023.0, DEFAULT_DECIMALS), "1023 Bytes");
        assert_eq!(format_bytes(1024.0, DEFAULT_DECIMALS), "1 KB");
        assert_eq!(format_bytes(1024.0 * 1024.0, DEFAULT_DECIMALS), "1 MB");
        assert_eq!(format_bytes(5_244_928.0, DEFAULT_DECIMALS), "5 MB");
        assert_eq!(format_bytes(1_319_413_953_331.0, DEFAULT_DECIMALS), "1.2 TB");
    }

    #[test]
    fn format_bytes_trims_trailing_zeros() {
        assert_eq!(format_bytes(5.0 * 1024.0 * 1024.0, DEFAULT_DECIMALS), "5 MB");
        assert_eq!(format_bytes(5.25 * 1024.0 * 1024.0, DEFAULT_DECIMALS), "5.25 MB");
        assert_eq!(format_bytes(5.10 * 1024.0, DEFAULT_DECIMALS), "5.1 KB");
    }

    #[test]
    fn format_bytes_clamps_to_largest_unit() {
        let beyond_table = 1024_f64.powi(9);
        assert_eq!(format_bytes(beyond_table, DEFAULT_DECIMALS), "1024 YB");
    }

    #[test]
    fn manual_unit_conversions_are_1024_based() {
        assert_eq!(ManualUnit::Kilobytes.to_bytes(2.0), 2048.0);
        assert_eq!(ManualUnit::Megabytes.to_bytes(5.0), 5_242_880.0);
        assert_eq!(ManualUnit::Gigabytes.to_bytes(1.0), 1_073_741_824.0);
    }

    #[test]
    fn manual_unit_parses_case_insensitively() {
        assert_eq!("kb".parse::<ManualUnit>().unwrap(), ManualUnit::Kilobytes);
        assert_eq!("MB".parse::<ManualUnit>().unwrap(), ManualUnit::Megabytes);
        assert_eq!(" Gb ".parse::<ManualUnit>().unwrap(), ManualUnit::Gigabytes);
        assert!("TB".parse::<ManualUnit>().is_err());
    }

    #[test]
    fn user_serializes_with_camel_case_storage_schema() {
        let mut user = User::new("u1", "Alice");
        user.total_usage = 1_048_576.0;
        user.usage_history.push(UsageRecord {
            timestamp: 1_700_000_000_000,
            usage: 1_048_576.0,
        });

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["totalUsage"], 1_048_576.0);
        assert_eq!(json["usageHistory"][0]["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(json["usageHistory"][0]["usage"], 1_048_576.0);

        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn seed_users_satisfy_the_total_invariant() {
        let users = seed_users(1_700_000_000_000);
        assert_eq!(users.len(), 4);
        for user in &users {
            assert!(!user.usage_history.is_empty());
            assert_eq!(user.total_usage, user.history_total());
        }
        let dana = &users[3];
        assert_eq!(dana.total_usage, 1_319_413_953_331.0);
    }
}
