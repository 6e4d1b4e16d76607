//! Connect workflow end to end against the scripted driver: dedup,
//! quota enforcement, retries, note handling and persistence.

use outreach_core::{
    ConnectOutcome, ConnectService, CoreError, DriverError, HumanTiming, Ledger, PageDriver,
    ProfileSummary, QuotaConfig, RetryConfig, ScriptedDriver, SimProfile, TimingProfile,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BASE: &str = "http://localhost:8080";

fn fast_timing() -> HumanTiming {
    HumanTiming::with_profile(TimingProfile::fast(), CancellationToken::new())
}

async fn open_ledger(dir: &TempDir) -> Arc<Ledger> {
    let path = dir.path().join("outreach.db");
    Arc::new(Ledger::open(path.to_str().unwrap()).await.unwrap())
}

fn alice() -> ProfileSummary {
    ProfileSummary {
        id: 1,
        name: "Alice Smith".to_string(),
        title: "Engineer".to_string(),
        company: "TechNova".to_string(),
        connected: false,
    }
}

async fn driver_on_search(profiles: Vec<SimProfile>) -> ScriptedDriver {
    let mut driver = ScriptedDriver::new(BASE);
    for p in profiles {
        driver = driver.with_profile(p);
    }
    driver.mark_logged_in();
    driver.navigate(&format!("{}/search", BASE)).await.unwrap();
    driver
}

fn service(ledger: Arc<Ledger>, quota: QuotaConfig) -> ConnectService {
    ConnectService::new(ledger, fast_timing(), quota)
        .with_retry_config(RetryConfig::new(3, 10))
}

#[tokio::test]
async fn connect_sends_note_and_persists() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let outcome = svc
        .connect(&driver, &alice(), "Hi Alice, let's connect!")
        .await
        .unwrap();

    assert_eq!(outcome, ConnectOutcome::Requested);
    assert_eq!(driver.requested_ids(), vec![1]);
    assert_eq!(driver.note_sent_to(1).unwrap(), "Hi Alice, let's connect!");
    assert!(ledger.is_requested(1).await.unwrap());
    assert_eq!(ledger.todays_request_count().await.unwrap(), 1);

    ledger.close().await;
}

#[tokio::test]
async fn duplicate_target_never_touches_the_page() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    ledger
        .mark_requested(1, "Alice Smith", "Engineer", "TechNova")
        .await
        .unwrap();

    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let before = driver.interaction_count();
    let outcome = svc.connect(&driver, &alice(), "note").await.unwrap();

    assert_eq!(outcome, ConnectOutcome::AlreadyRequested);
    assert_eq!(driver.interaction_count(), before);
    assert!(driver.requested_ids().is_empty());

    ledger.close().await;
}

#[tokio::test]
async fn daily_quota_blocks_before_any_interaction() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver = driver_on_search(vec![
        SimProfile::new(1, "Alice Smith", "Engineer", "TechNova"),
        SimProfile::new(2, "Bob Jones", "Analyst", "FinLeap"),
    ])
    .await;
    let svc = service(
        Arc::clone(&ledger),
        QuotaConfig {
            daily_limit: 1,
            session_limit: None,
        },
    );

    svc.connect(&driver, &alice(), "note").await.unwrap();

    let bob = ProfileSummary {
        id: 2,
        name: "Bob Jones".to_string(),
        title: "Analyst".to_string(),
        company: "FinLeap".to_string(),
        connected: false,
    };
    let before = driver.interaction_count();
    let err = svc.connect(&driver, &bob, "note").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::RateLimitExceeded { scope: "daily", used: 1, limit: 1 })
    ));
    assert_eq!(driver.interaction_count(), before);
    assert!(!ledger.is_requested(2).await.unwrap());

    ledger.close().await;
}

#[tokio::test]
async fn session_cap_is_independent_of_daily_quota() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    let svc = service(
        Arc::clone(&ledger),
        QuotaConfig {
            daily_limit: 20,
            session_limit: Some(0),
        },
    );

    let err = svc.connect(&driver, &alice(), "note").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::RateLimitExceeded { scope: "session", .. })
    ));

    ledger.close().await;
}

#[tokio::test]
async fn button_lookup_retries_through_transient_misses() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    driver.fail_find(".connect-btn[data-id='1']", 2);
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let outcome = svc.connect(&driver, &alice(), "note").await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Requested);

    ledger.close().await;
}

#[tokio::test]
async fn hidden_button_is_scrolled_into_view() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    driver.hide(".connect-btn[data-id='1']");
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let outcome = svc.connect(&driver, &alice(), "note").await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Requested);

    ledger.close().await;
}

#[tokio::test]
async fn obstructed_send_control_fails_without_persisting() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    driver.hide("#send-note");
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let err = svc.connect(&driver, &alice(), "note").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriverError>(),
        Some(DriverError::Obstructed { .. })
    ));
    assert!(!ledger.is_requested(1).await.unwrap());

    ledger.close().await;
}

#[tokio::test]
async fn long_note_is_capped_at_300_chars() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    let long_note = "x".repeat(400);
    svc.connect(&driver, &alice(), &long_note).await.unwrap();

    assert_eq!(driver.note_sent_to(1).unwrap().chars().count(), 300);

    ledger.close().await;
}

#[tokio::test]
async fn empty_note_gets_a_default() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver =
        driver_on_search(vec![SimProfile::new(1, "Alice Smith", "Engineer", "TechNova")]).await;
    let svc = service(Arc::clone(&ledger), QuotaConfig::default());

    svc.connect(&driver, &alice(), "").await.unwrap();

    let note = driver.note_sent_to(1).unwrap();
    assert!(note.contains("Alice Smith"), "{}", note);

    ledger.close().await;
}

#[tokio::test]
async fn settle_timeout_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let mut driver = ScriptedDriver::new(BASE)
        .with_profile(SimProfile::new(1, "Alice Smith", "Engineer", "TechNova"));
    driver = driver.with_idle_timeout();
    driver.mark_logged_in();
    driver.navigate(&format!("{}/search", BASE)).await.unwrap();

    let svc = service(Arc::clone(&ledger), QuotaConfig::default());
    let outcome = svc.connect(&driver, &alice(), "note").await.unwrap();

    // Dispatch happened; the record lands even though the UI never settled.
    assert_eq!(outcome, ConnectOutcome::Requested);
    assert!(ledger.is_requested(1).await.unwrap());

    ledger.close().await;
}

#[tokio::test]
async fn auto_accept_greeting_lands_in_shared_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver = ScriptedDriver::new(BASE)
        .with_profile(SimProfile::new(1, "Alice Smith", "Engineer", "TechNova"))
        .with_ledger(Arc::clone(&ledger));
    driver.mark_logged_in();
    driver.navigate(&format!("{}/search", BASE)).await.unwrap();

    let svc = service(Arc::clone(&ledger), QuotaConfig::default());
    svc.connect(&driver, &alice(), "note").await.unwrap();

    assert!(driver.is_connected(1));
    // The greeting is written by a spawned task a moment later.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let history = ledger.messages_for_profile(1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender, "user");
    assert_eq!(history[0].message_type, "auto_greeting");

    ledger.close().await;
}

#[tokio::test]
async fn unaccepted_request_stays_pending() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;
    let driver = ScriptedDriver::new(BASE)
        .with_profile(SimProfile::new(1, "Alice Smith", "Engineer", "TechNova"))
        .without_auto_accept();
    driver.mark_logged_in();
    driver.navigate(&format!("{}/search", BASE)).await.unwrap();

    let svc = service(Arc::clone(&ledger), QuotaConfig::default());
    svc.connect(&driver, &alice(), "note").await.unwrap();

    assert_eq!(driver.requested_ids(), vec![1]);
    assert!(!driver.is_connected(1));
    let row = ledger.connection(1).await.unwrap().unwrap();
    assert_eq!(row.status, "requested");

    ledger.close().await;
}
