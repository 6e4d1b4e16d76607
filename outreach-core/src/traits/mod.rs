use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Outcome counters for one campaign run.
#[derive(Debug, Default, Clone)]
pub struct CampaignStats {
    /// Connection requests dispatched.
    pub requested: u64,
    /// Follow-up / greeting messages sent.
    pub messaged: u64,
    /// Targets skipped (dedup, quota, per-target failure).
    pub skipped: u64,
    /// Targets that failed outright.
    pub failed: u64,
}

/// One end-to-end outreach script. The runner spawns it as the single
/// background task and hands it the shutdown token; implementations are
/// expected to check the token between workflow steps and to thread it
/// into every timed wait.
#[async_trait]
pub trait Campaign: Send + Sync {
    /// Human-readable name used in logs and the run summary.
    fn name(&self) -> &str;

    async fn run(&self, token: CancellationToken) -> Result<CampaignStats>;
}
