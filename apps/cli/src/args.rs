use std::env;
use std::path::PathBuf;

use meter_core::ManualUnit;

#[derive(Debug)]
pub struct ManualEntry {
    pub amount: f64,
    pub unit: ManualUnit,
}

#[derive(Debug)]
pub enum Command {
    List,
    Add { name: String },
    Delete { id: String },
    History { id: String },
    ClearHistory { id: String },
    ClearAllHistory,
    ClearAllData,
    Track { id: String, manual: Vec<ManualEntry> },
}

#[derive(Debug)]
pub struct CliArgs {
    pub command: Command,
    pub data_dir: Option<PathBuf>,
}

pub fn parse_args() -> Result<CliArgs, String> {
    let mut args = env::args().skip(1).peekable();
    let mut data_dir = None;
    let mut positional: Vec<String> = Vec::new();
    let mut manual: Vec<ManualEntry> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --data-dir".to_string())?;
                data_dir = Some(PathBuf::from(value));
            }
            "--manual" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --manual".to_string())?;
                manual.push(parse_manual(&value)?);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown argument: {other}"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("list") => Command::List,
        Some("add") => Command::Add {
            name: positional
                .next()
                .ok_or_else(|| "usage: data-meter add <name>".to_string())?,
        },
        Some("delete") => Command::Delete {
            id: positional
                .next()
                .ok_or_else(|| "usage: data-meter delete <id>".to_string())?,
        },
        Some("history") => Command::History {
            id: positional
                .next()
                .ok_or_else(|| "usage: data-meter history <id>".to_string())?,
        },
        Some("clear-history") => Command::ClearHistory {
            id: positional
                .next()
                .ok_or_else(|| "usage: data-meter clear-history <id>".to_string())?,
        },
        Some("clear-all-history") => Command::ClearAllHistory,
        Some("clear-all-data") => Command::ClearAllData,
        Some("track") => Command::Track {
            id: positional
                .next()
                .ok_or_else(|| "usage: data-meter track <id> [--manual <amount><unit>]".to_string())?,
            manual: std::mem::take(&mut manual),
        },
        Some(other) => return Err(format!("unknown command: {other}")),
    };

    if !manual.is_empty() {
        return Err("--manual is only valid with the track command".to_string());
    }
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    Ok(CliArgs { command, data_dir })
}

/// Parses a manual entry like `5MB`, `2.5GB` or `512KB`.
fn parse_manual(value: &str) -> Result<ManualEntry, String> {
    let value = value.trim();
    let split_at = value
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| format!("missing unit in manual entry: {value}"))?;
    let (amount, unit) = value.split_at(split_at);
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid manual amount: {value}"))?;
    let unit: ManualUnit = unit.parse()?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(format!("manual amount must be positive: {value}"));
    }
    Ok(ManualEntry { amount, unit })
}

pub fn print_help() {
    println!(
        "Data Meter CLI\n\n\
Usage:\n  data-meter [--data-dir <path>] <command>\n\n\
Commands:\n  list                    List users with their usage totals (default)\n  add <name>              Add a user\n  delete <id>             Delete a user\n  history <id>            Show a user's usage history\n  clear-history <id>      Clear one user's history and total\n  clear-all-history       Clear every user's history and total\n  clear-all-data          Remove all users\n  track <id>              Track a live session; Ctrl-C stops and saves\n    --manual <n><unit>    Add a manual entry (KB, MB or GB), repeatable\n\n\
Options:\n  --data-dir <path>  Override the data directory for this run\n  -h, --help         Show this help message\n"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_manual_accepts_amount_with_unit() {
        let entry = parse_manual("5MB").expect("parse");
        assert_eq!(entry.amount, 5.0);
        assert_eq!(entry.unit, ManualUnit::Megabytes);

        let entry = parse_manual("2.5gb").expect("parse");
        assert_eq!(entry.amount, 2.5);
        assert_eq!(entry.unit, ManualUnit::Gigabytes);
    }

    #[test]
    fn parse_manual_rejects_bad_input() {
        assert!(parse_manual("MB").is_err());
        assert!(parse_manual("5").is_err());
        assert!(parse_manual("-5MB").is_err());
        assert!(parse_manual("5TB").is_err());
    }
}
