use crate::error::Result;
use crate::repository::UserRepository;
use meter_core::UsageRecord;

/// Folds a finished session's accumulated bytes into the user's durable
/// totals and history.
///
/// Exactly one record is appended per stop-and-save; abandoned sessions
/// never reach this point.
pub fn reconcile(
    repo: &mut UserRepository,
    user_id: &str,
    accumulated_bytes: f64,
) -> Result<UsageRecord> {
    repo.update_user_usage(user_id, accumulated_bytes)
}
