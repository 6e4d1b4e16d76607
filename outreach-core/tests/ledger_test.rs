//! Ledger semantics: dedup rows, the daily request count, follow-up
//! bookkeeping and the activity trail.

use outreach_core::{ConnectionStatus, Ledger};
use tempfile::TempDir;

async fn open_ledger(dir: &TempDir) -> Ledger {
    let path = dir.path().join("outreach.db");
    Ledger::open(path.to_str().unwrap()).await.unwrap()
}

#[tokio::test]
async fn request_rows_deduplicate() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    assert!(!ledger.is_requested(1).await.unwrap());
    ledger
        .mark_requested(1, "Alice Smith", "Engineer", "TechNova")
        .await
        .unwrap();
    assert!(ledger.is_requested(1).await.unwrap());
    assert!(!ledger.is_requested(2).await.unwrap());

    let row = ledger.connection(1).await.unwrap().unwrap();
    assert_eq!(row.name, "Alice Smith");
    assert_eq!(row.status, ConnectionStatus::Requested.as_str());

    ledger.close().await;
}

#[tokio::test]
async fn daily_count_tracks_requested_rows_only() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    assert_eq!(ledger.todays_request_count().await.unwrap(), 0);
    ledger.mark_requested(1, "Alice", "", "").await.unwrap();
    ledger.mark_requested(2, "Bob", "", "").await.unwrap();
    assert_eq!(ledger.todays_request_count().await.unwrap(), 2);

    // Promotion to connected removes the row from today's request count.
    ledger
        .update_status(1, ConnectionStatus::Connected)
        .await
        .unwrap();
    assert_eq!(ledger.todays_request_count().await.unwrap(), 1);

    ledger.close().await;
}

#[tokio::test]
async fn status_update_preserves_creation_time() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.mark_requested(1, "Alice", "Engineer", "TechNova").await.unwrap();
    let before = ledger.connection(1).await.unwrap().unwrap();

    ledger
        .update_status(1, ConnectionStatus::Connected)
        .await
        .unwrap();
    let after = ledger.connection(1).await.unwrap().unwrap();

    assert_eq!(after.status, ConnectionStatus::Connected.as_str());
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.name, "Alice");

    ledger.close().await;
}

#[tokio::test]
async fn follow_up_dedup_ignores_other_message_types() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger
        .mark_message_sent(1, "user", "auto_greeting", "Hi, thanks for connecting!")
        .await
        .unwrap();
    assert!(!ledger.has_sent_follow_up(1).await.unwrap());

    ledger
        .mark_message_sent(1, "bot", "follow_up", "Great to be connected!")
        .await
        .unwrap();
    assert!(ledger.has_sent_follow_up(1).await.unwrap());

    ledger.close().await;
}

#[tokio::test]
async fn pending_follow_ups_excludes_messaged_profiles() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.mark_requested(1, "Alice", "", "").await.unwrap();
    ledger.mark_requested(2, "Bob", "", "").await.unwrap();
    ledger.mark_requested(3, "Carol", "", "").await.unwrap();
    ledger.update_status(1, ConnectionStatus::Connected).await.unwrap();
    ledger.update_status(2, ConnectionStatus::Connected).await.unwrap();

    ledger
        .mark_message_sent(1, "bot", "follow_up", "hello")
        .await
        .unwrap();

    let pending = ledger.pending_follow_ups().await.unwrap();
    let ids: Vec<i64> = pending.iter().map(|c| c.profile_id).collect();
    // 1 is already messaged, 3 is still only requested.
    assert_eq!(ids, vec![2]);

    ledger.close().await;
}

#[tokio::test]
async fn message_history_is_ordered() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.mark_message_sent(5, "user", "auto_greeting", "first").await.unwrap();
    ledger.mark_message_sent(5, "bot", "follow_up", "second").await.unwrap();
    ledger.mark_message_sent(6, "bot", "follow_up", "other profile").await.unwrap();

    let history = ledger.messages_for_profile(5).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "first");
    assert_eq!(history[0].sender, "user");
    assert_eq!(history[1].content, "second");
    assert_eq!(history[1].sender, "bot");

    ledger.close().await;
}

#[tokio::test]
async fn metrics_track_query_volume() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let baseline = ledger.metrics_snapshot();
    assert_eq!(baseline.error_rate(), 0.0);

    ledger.mark_requested(1, "Alice", "", "").await.unwrap();
    ledger.is_requested(1).await.unwrap();
    ledger.log_activity("Action", "test entry").await.unwrap();

    let snapshot = ledger.metrics_snapshot();
    assert!(snapshot.total_inserts >= 2);
    assert!(snapshot.total_selects >= 1);
    assert_eq!(snapshot.total_errors, 0);

    ledger.close().await;
}
