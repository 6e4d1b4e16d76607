use crate::traits::Campaign;
use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

pub struct CampaignRunner;

impl CampaignRunner {
    /// Runs one campaign as the single background task and waits for it.
    /// The foreground only listens for Ctrl+C and cancels the token; the
    /// campaign winds down at its next cancellable wait. An in-flight page
    /// action is abandoned, never rolled back.
    pub async fn run(campaign: Box<dyn Campaign>) -> Result<()> {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!(target: "outreach", "🛑 Received Ctrl+C. Initiating graceful shutdown...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        let start_time = std::time::Instant::now();
        let name = campaign.name().to_string();
        info!(target: "outreach", "Starting campaign '{}'...", name);

        let span = tracing::info_span!("campaign", name = %name);
        let child_token = token.clone();
        let handle = tokio::spawn(
            async move { campaign.run(child_token).await }.instrument(span),
        );

        let stats = match handle.await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                error!(target: "outreach", "Campaign '{}' FAILED: {:?}", name, e);
                return Err(e);
            }
            Err(e) => {
                error!("Campaign task panicked or failed to join: {:?}", e);
                return Err(e.into());
            }
        };

        let total_duration = start_time.elapsed();
        info!(target: "outreach", "🛑 Campaign '{}' complete.", name);
        info!(
            target: "outreach",
            "Total Time: {:.1}s | Requested: {} | Messaged: {} | Skipped: {} | Failed: {}",
            total_duration.as_secs_f64(),
            stats.requested,
            stats.messaged,
            stats.skipped,
            stats.failed
        );

        Ok(())
    }
}
