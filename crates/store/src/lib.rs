mod error;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use meter_core::User;

pub use error::{Result, StoreError};

/// Fixed name of the serialized user collection inside the app data dir.
pub const STORAGE_FILE_NAME: &str = "data-meter-users.json";

/// Durable store for the whole user collection.
///
/// One JSON array of users in one file; every write replaces the whole
/// collection. The repository is the only writer.
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(STORAGE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted collection.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. Read, parse
    /// and validation failures are errors; the caller is expected to fall
    /// back to seed data rather than trust a partial shape.
    pub fn load(&self) -> Result<Option<Vec<User>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let users: Vec<User> = serde_json::from_str(&contents)?;
        validate_users(&users)?;
        Ok(Some(users))
    }

    /// Replaces the persisted collection atomically (temp file + rename).
    pub fn save(&self, users: &[User]) -> Result<()> {
        let contents = serde_json::to_string_pretty(users)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Strict post-parse validation. Fails closed on any shape the rest of the
/// system is not prepared to handle.
fn validate_users(users: &[User]) -> Result<()> {
    let mut seen_ids = HashSet::new();
    for user in users {
        if user.id.is_empty() {
            return Err(StoreError::Corrupt(format!(
                "user {:?} has an empty id",
                user.name
            )));
        }
        if !seen_ids.insert(user.id.as_str()) {
            return Err(StoreError::Corrupt(format!("duplicate user id {}", user.id)));
        }
        if !user.total_usage.is_finite() || user.total_usage < 0.0 {
            return Err(StoreError::Corrupt(format!(
                "user {} has invalid total usage {}",
                user.id, user.total_usage
            )));
        }
        for record in &user.usage_history {
            if !record.usage.is_finite() || record.usage < 0.0 {
                return Err(StoreError::Corrupt(format!(
                    "user {} has invalid usage record {}",
                    user.id, record.usage
                )));
            }
        }
        let history_total = user.history_total();
        if (user.total_usage - history_total).abs() > 1e-6 {
            return Err(StoreError::Corrupt(format!(
                "user {} total {} does not match history sum {}",
                user.id, user.total_usage, history_total
            )));
        }
    }
    Ok(())
}
