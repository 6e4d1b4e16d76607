//! # Action Quota
//!
//! Gatekeeper for state-changing actions. The ledger's count of requests
//! created today is the single authoritative daily source and is re-queried
//! on every decision; the only in-memory state is the optional
//! process-lifetime session cap, which is independent of the calendar-day
//! cap and survives until `reset_session`.

use crate::error::CoreError;
use crate::ledger::Ledger;
use anyhow::Result;

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    /// Maximum connection requests per local calendar day.
    pub daily_limit: u32,
    /// Optional cap on actions within this process lifetime.
    pub session_limit: Option<u32>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 20,
            session_limit: None,
        }
    }
}

#[derive(Debug)]
pub struct ActionQuota {
    config: QuotaConfig,
    session_count: u32,
}

impl ActionQuota {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            session_count: 0,
        }
    }

    /// Checks both caps, leaving the ledger untouched. Returns the number
    /// of requests already made today, or `CoreError::RateLimitExceeded`.
    pub async fn try_reserve(&self, ledger: &Ledger) -> Result<u32> {
        if let Some(limit) = self.config.session_limit {
            if self.session_count >= limit {
                return Err(CoreError::RateLimitExceeded {
                    scope: "session",
                    used: self.session_count,
                    limit,
                }
                .into());
            }
        }

        let used = ledger.todays_request_count().await?;
        if used >= self.config.daily_limit {
            return Err(CoreError::RateLimitExceeded {
                scope: "daily",
                used,
                limit: self.config.daily_limit,
            }
            .into());
        }
        Ok(used)
    }

    pub fn record_success(&mut self) {
        self.session_count += 1;
    }

    pub fn reset_session(&mut self) {
        self.session_count = 0;
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn daily_limit(&self) -> u32 {
        self.config.daily_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counter_tracks_successes() {
        let mut quota = ActionQuota::new(QuotaConfig {
            daily_limit: 20,
            session_limit: Some(2),
        });
        assert_eq!(quota.session_count(), 0);
        quota.record_success();
        quota.record_success();
        assert_eq!(quota.session_count(), 2);
        quota.reset_session();
        assert_eq!(quota.session_count(), 0);
    }
}
