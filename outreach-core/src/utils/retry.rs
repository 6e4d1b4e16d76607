use anyhow::{Context, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            exponential_base: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: base_delay_ms * 30,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay after the Nth failure (1-based): base doubling each time,
    /// capped at `max_delay_ms`.
    fn delay_after_failure(&self, failures: u32) -> Duration {
        let delay_ms = self.base_delay_ms as f64
            * self.exponential_base.powi(failures.saturating_sub(1) as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        let delay_ms = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            delay_ms * factor
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Runs `operation` up to `config.max_attempts` times, sleeping the
/// backoff delay between failures. Strictly sequential: each attempt
/// completes before the next starts. The backoff sleep races the shutdown
/// token so a cancelled run does not sit out a pending delay.
///
/// Exhausting every attempt returns the final error contextualized with
/// the operation name and attempt count.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);

    for attempt in 1..=attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt == attempts {
                    return Err(e).context(format!(
                        "{} failed after {} attempts",
                        operation_name, attempts
                    ));
                }

                let delay = config.delay_after_failure(attempt);
                warn!(
                    "{} failed (attempt {}/{}). Retrying in {:?}: {}",
                    operation_name, attempt, attempts, delay, e
                );

                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(anyhow::anyhow!(
                            "{} aborted during backoff (shutdown requested)",
                            operation_name
                        ));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    unreachable!()
}
