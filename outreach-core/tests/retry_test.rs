//! Retry executor behavior: attempt accounting, backoff pacing and
//! shutdown-token cancellation during a pending backoff.

use outreach_core::{with_retry, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn first_success_runs_once() {
    let calls = AtomicU32::new(0);
    let token = CancellationToken::new();
    let config = RetryConfig::new(3, 10);

    let result: anyhow::Result<u32> = with_retry(&config, "Probe", &token, || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(n) }
    })
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let calls = AtomicU32::new(0);
    let token = CancellationToken::new();
    let config = RetryConfig::new(3, 10);

    let result: anyhow::Result<&str> = with_retry(&config, "Probe", &token, || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n < 3 {
                Err(anyhow::anyhow!("not yet"))
            } else {
                Ok("done")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhaustion_reports_attempt_count() {
    let calls = AtomicU32::new(0);
    let token = CancellationToken::new();
    let config = RetryConfig::new(3, 10);

    let result: anyhow::Result<()> = with_retry(&config, "Click Connect", &token, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(anyhow::anyhow!("element missing")) }
    })
    .await;

    let err = format!("{:?}", result.unwrap_err());
    assert!(err.contains("Click Connect failed after 3 attempts"), "{}", err);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn backoff_doubles_between_attempts() {
    let token = CancellationToken::new();
    let config = RetryConfig::new(3, 50);
    let start = Instant::now();

    let result: anyhow::Result<()> = with_retry(&config, "Probe", &token, || async {
        Err(anyhow::anyhow!("always"))
    })
    .await;

    assert!(result.is_err());
    // Two backoffs: 50ms then 100ms.
    assert!(start.elapsed().as_millis() >= 140, "{:?}", start.elapsed());
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let token = CancellationToken::new();
    token.cancel();
    let config = RetryConfig::new(3, 60_000);
    let start = Instant::now();

    let result: anyhow::Result<()> = with_retry(&config, "Probe", &token, || async {
        Err(anyhow::anyhow!("always"))
    })
    .await;

    let err = format!("{:?}", result.unwrap_err());
    assert!(err.contains("aborted during backoff"), "{}", err);
    // Never sat out the 60s delay.
    assert!(start.elapsed().as_secs() < 5);
}
