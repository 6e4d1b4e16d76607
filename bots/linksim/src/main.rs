use linksim::campaign::OutreachCampaign;
use linksim::config::load_config;
use linksim::session::build_session;

use anyhow::Result;
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Password};
use dotenv::dotenv;
use outreach_core::{setup_logger, CampaignRunner, Ledger, TimingProfile};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "bots/linksim/config.toml")]
    config: String,
    /// People-search query fed to the campaign.
    #[arg(short, long, default_value = "engineer")]
    query: String,
    /// Run every wait at zero delay.
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = setup_logger();
    // Keep guard alive for file logging
    std::mem::forget(_log_guard);
    dotenv().ok();

    let args = Args::parse();
    info!("Loading config from: {}", args.config);

    let mut config = match load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Ok(());
        }
    };
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Ok(());
    }

    // An empty password means "prompt"; never proceed with a blank one.
    if config.password.is_empty() {
        match Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Enter account password")
            .interact()
        {
            Ok(input) => config.password = input,
            Err(_) => {
                error!("Cannot prompt for password (not a terminal).");
                error!("Set OUTREACH_PASSWORD or put it in the config file.");
                return Ok(());
            }
        }
    }

    info!(
        "Configuration loaded: target {} (daily limit {})",
        config.app_url, config.daily_limit
    );

    let ledger = Arc::new(Ledger::open(&config.db_path).await?);
    let driver = Arc::new(build_session(&config, Arc::clone(&ledger)));

    let timing = if args.fast {
        TimingProfile::fast()
    } else {
        TimingProfile::default()
    };
    let campaign = OutreachCampaign::new(
        config,
        Arc::clone(&ledger),
        driver,
        &args.query,
    )
    .with_timing_profile(timing);

    CampaignRunner::run(Box::new(campaign)).await?;

    let snapshot = ledger.metrics_snapshot();
    info!(
        "Ledger: {} queries, {} inserts, {:.1}% error rate",
        snapshot.total_queries,
        snapshot.total_inserts,
        snapshot.error_rate()
    );
    ledger.close().await;

    Ok(())
}
