//! # Human Timing Model
//!
//! Randomized pacing for every page interaction: think-delays before
//! actions, per-character typing cadence and scroll bursts. All waits go
//! through `tokio::select!` against the shutdown token, so a requested
//! shutdown interrupts a pending delay instead of waiting it out.

use crate::driver::PageDriver;
use anyhow::Result;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-character typing bounds in milliseconds.
const TYPE_DELAY_MIN_MS: u64 = 50;
const TYPE_DELAY_MAX_MS: u64 = 200;

/// Scales every randomized wait. `1.0` is human speed; tests run at `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct TimingProfile {
    pub time_scale: f64,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self { time_scale: 1.0 }
    }
}

impl TimingProfile {
    /// Zero-delay profile for tests and dry runs.
    pub fn fast() -> Self {
        Self { time_scale: 0.0 }
    }
}

#[derive(Clone)]
pub struct HumanTiming {
    profile: TimingProfile,
    token: CancellationToken,
}

impl HumanTiming {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            profile: TimingProfile::default(),
            token,
        }
    }

    pub fn with_profile(profile: TimingProfile, token: CancellationToken) -> Self {
        Self { profile, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn scaled(&self, ms: u64) -> Duration {
        Duration::from_millis((ms as f64 * self.profile.time_scale) as u64)
    }

    async fn pause(&self, ms: u64) {
        let delay = self.scaled(ms);
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// Blocks for a uniformly random duration in `[min_ms, max_ms)`,
    /// simulating a user thinking before performing an action.
    pub async fn think_delay(&self, min_ms: u64, max_ms: u64) {
        let ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min_ms..max_ms)
        };
        self.pause(ms).await;
    }

    /// Focuses the target and emits the text one keystroke at a time,
    /// each preceded by an independent random delay. A driver failure
    /// mid-sequence aborts the whole call with the underlying error.
    pub async fn type_into(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        text: &str,
    ) -> Result<()> {
        let element = driver.find_element(selector).await?;
        element.focus().await?;

        for ch in text.chars() {
            let ms = {
                let mut rng = rand::thread_rng();
                rng.gen_range(TYPE_DELAY_MIN_MS..TYPE_DELAY_MAX_MS)
            };
            self.pause(ms).await;
            driver.keyboard_type(ch).await?;
        }
        Ok(())
    }

    /// Scrolls the page like a human skimming results: three bursts of
    /// randomized distance, each followed by a think-delay.
    pub async fn random_scroll(&self, driver: &dyn PageDriver) -> Result<()> {
        for _ in 0..3 {
            let dist = {
                let mut rng = rand::thread_rng();
                rng.gen_range(100..400)
            };
            driver.scroll_by(0, dist).await?;
            self.think_delay(500, 1500).await;
        }
        Ok(())
    }
}
