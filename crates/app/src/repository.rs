use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use meter_core::{UsageRecord, User, seed_users};
use meter_store::UserStore;

/// In-memory authoritative user collection and the sole writer of the store.
///
/// Mutations are synchronous and single-threaded; every mutation writes the
/// whole collection back. A failed write is logged and swallowed so the
/// in-memory state stays usable even when durable persistence is failing.
pub struct UserRepository {
    store: UserStore,
    users: Vec<User>,
}

impl UserRepository {
    /// Loads the repository from the store, seeding with the default dataset
    /// when nothing valid has been persisted yet. The seed is persisted
    /// immediately so seeding happens at most once.
    pub fn open(store: UserStore) -> Self {
        let users = match store.load() {
            Ok(Some(users)) => users,
            Ok(None) => Self::seed(&store),
            Err(err) => {
                eprintln!("failed to load user store, falling back to seed data: {err}");
                Self::seed(&store)
            }
        };
        Self { store, users }
    }

    fn seed(store: &UserStore) -> Vec<User> {
        let users = seed_users(Utc::now().timestamp_millis());
        if let Err(err) = store.save(&users) {
            eprintln!("failed to persist seed data: {err}");
        }
        users
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    /// Appends a new user with a fresh id, zero usage and empty history.
    pub fn add_user(&mut self, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "user name must not be empty".to_string(),
            ));
        }
        let user = User::new(Uuid::new_v4().to_string(), name);
        self.users.push(user.clone());
        self.persist_or_warn();
        Ok(user)
    }

    /// Removes the user if present; absent ids are a no-op, not an error.
    pub fn delete_user(&mut self, id: &str) {
        let before = self.users.len();
        self.users.retain(|user| user.id != id);
        if self.users.len() != before {
            self.persist_or_warn();
        }
    }

    /// Appends one usage record and bumps the user's total.
    ///
    /// Zero usage is allowed and still appends a record; negative or
    /// non-finite usage is rejected before any state changes.
    pub fn update_user_usage(&mut self, id: &str, session_usage: f64) -> Result<UsageRecord> {
        if !session_usage.is_finite() || session_usage < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "session usage must be a non-negative number, got {session_usage}"
            )));
        }
        let user = self
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or_else(|| AppError::NotFound(format!("no user with id {id}")))?;
        let record = UsageRecord {
            timestamp: Utc::now().timestamp_millis(),
            usage: session_usage,
        };
        user.usage_history.push(record);
        user.total_usage += session_usage;
        self.persist_or_warn();
        Ok(record)
    }

    /// Resets the matching user's total and history; no-op if absent.
    pub fn clear_user_history(&mut self, id: &str) {
        let Some(user) = self.users.iter_mut().find(|user| user.id == id) else {
            return;
        };
        user.total_usage = 0.0;
        user.usage_history.clear();
        self.persist_or_warn();
    }

    pub fn clear_all_users_history(&mut self) {
        for user in &mut self.users {
            user.total_usage = 0.0;
            user.usage_history.clear();
        }
        self.persist_or_warn();
    }

    pub fn clear_all_data(&mut self) {
        self.users.clear();
        self.persist_or_warn();
    }

    /// Explicit flush for callers that want to observe persistence failures.
    pub fn persist(&self) -> Result<()> {
        Ok(self.store.save(&self.users)?)
    }

    fn persist_or_warn(&self) {
        if let Err(err) = self.persist() {
            eprintln!("failed to persist user store: {err}");
        }
    }
}
