use std::sync::Arc;
use std::time::Duration;

use meter_app::session::{FetchError, PayloadFetcher};
use meter_app::{TrackingSession, UserRepository, reconcile};
use meter_core::ManualUnit;
use meter_store::UserStore;
use tempfile::tempdir;

struct FixedFetcher(f64);

impl PayloadFetcher for FixedFetcher {
    fn fetch_payload_size(&self) -> Result<f64, FetchError> {
        Ok(self.0)
    }
}

#[tokio::test]
async fn track_and_reconcile_survives_reload() {
    let dir = tempdir().expect("temp dir");
    let mut repo = UserRepository::open(UserStore::in_dir(dir.path()));
    repo.clear_all_data();
    let user = repo.add_user("Alice").expect("add user");

    let mut session = TrackingSession::new(&user.id, Arc::new(FixedFetcher(1024.0)))
        .with_sample_interval(Duration::from_millis(10));
    session.add_manual(5.0, ManualUnit::Megabytes).expect("manual");
    session.add_manual(2.0, ManualUnit::Kilobytes).expect("manual");
    session.start().expect("start");
    for _ in 0..500 {
        if session.accumulated() >= 5_244_928.0 + 2048.0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let accumulated = session.stop().await;
    assert!(accumulated >= 5_244_928.0 + 2048.0);

    let record = reconcile(&mut repo, &user.id, accumulated).expect("reconcile");
    assert_eq!(record.usage, accumulated);

    // The committed state is durable: a fresh repository over the same store
    // sees the same totals, and the invariant holds.
    let reloaded = UserRepository::open(UserStore::in_dir(dir.path()));
    let alice = reloaded.get(&user.id).expect("persisted");
    assert_eq!(alice.total_usage, accumulated);
    assert_eq!(alice.usage_history.len(), 1);
    assert_eq!(alice.total_usage, alice.history_total());
}

#[tokio::test]
async fn abandoned_session_commits_nothing() {
    let dir = tempdir().expect("temp dir");
    let mut repo = UserRepository::open(UserStore::in_dir(dir.path()));
    repo.clear_all_data();
    let user = repo.add_user("Bob").expect("add user");

    {
        let mut session = TrackingSession::new(&user.id, Arc::new(FixedFetcher(1024.0)))
            .with_sample_interval(Duration::from_millis(10));
        session.add_manual(1.0, ManualUnit::Gigabytes).expect("manual");
        session.start().expect("start");
        // Dropped without stop(): back-navigation abandon path.
    }

    let bob = repo.get(&user.id).expect("present");
    assert_eq!(bob.total_usage, 0.0);
    assert!(bob.usage_history.is_empty());

    let reloaded = UserRepository::open(UserStore::in_dir(dir.path()));
    let bob = reloaded.get(&user.id).expect("persisted");
    assert_eq!(bob.total_usage, 0.0);
}

#[test]
fn repository_invariant_holds_across_operation_sequences() {
    let dir = tempdir().expect("temp dir");
    let mut repo = UserRepository::open(UserStore::in_dir(dir.path()));

    let alice = repo.users()[0].id.clone();
    repo.update_user_usage(&alice, 1_048_576.0).expect("update");
    repo.update_user_usage(&alice, 0.0).expect("update");
    repo.update_user_usage(&alice, 0.25).expect("update");
    let added = repo.add_user("Eve").expect("add");
    repo.update_user_usage(&added.id, 512.0).expect("update");
    repo.clear_user_history(&alice);
    repo.delete_user(&added.id);

    for user in repo.users() {
        assert_eq!(user.total_usage, user.history_total());
    }

    let reloaded = UserRepository::open(UserStore::in_dir(dir.path()));
    for user in reloaded.users() {
        assert_eq!(user.total_usage, user.history_total());
    }
}
