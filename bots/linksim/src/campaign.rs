//! The demo outreach script: authenticate, search, connect to new
//! profiles under quota, greet existing connections, then sweep accepted
//! requests and send follow-ups.

use anyhow::{Context, Result};
use async_trait::async_trait;
use outreach_core::workflow::render_template;
use outreach_core::{
    Authenticator, Campaign, CampaignStats, ConnectOutcome, ConnectService, CoreError,
    Credentials, HumanTiming, Ledger, MessageOutcome, MessagingService, OutreachConfig,
    PageDriver, QuotaConfig, ScriptedDriver, SearchService, TimingProfile,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct OutreachCampaign {
    config: OutreachConfig,
    ledger: Arc<Ledger>,
    driver: Arc<ScriptedDriver>,
    query: String,
    timing_profile: TimingProfile,
}

impl OutreachCampaign {
    pub fn new(
        config: OutreachConfig,
        ledger: Arc<Ledger>,
        driver: Arc<ScriptedDriver>,
        query: &str,
    ) -> Self {
        Self {
            config,
            ledger,
            driver,
            query: query.to_string(),
            timing_profile: TimingProfile::default(),
        }
    }

    pub fn with_timing_profile(mut self, profile: TimingProfile) -> Self {
        self.timing_profile = profile;
        self
    }

    fn template_vars(name: &str, company: &str) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("name", name.to_string());
        vars.insert("company", company.to_string());
        vars
    }

    /// Per-target pacing between connection requests. Races the shutdown
    /// token so a cancelled run does not sit out the cooldown.
    async fn cooldown(&self, token: &CancellationToken) {
        let secs = (self.config.cooldown_seconds as f64 * self.timing_profile.time_scale) as u64;
        if secs == 0 {
            return;
        }
        info!("Cooldown: waiting {}s before next target...", secs);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
    }
}

#[async_trait]
impl Campaign for OutreachCampaign {
    fn name(&self) -> &str {
        "linksim-outreach"
    }

    async fn run(&self, token: CancellationToken) -> Result<CampaignStats> {
        let driver: &dyn PageDriver = self.driver.as_ref();
        let timing = HumanTiming::with_profile(self.timing_profile, token.clone());
        let mut stats = CampaignStats::default();

        // Authentication failure aborts the whole run; nothing downstream
        // is meaningful without a session.
        let auth = Authenticator::new(&self.config.app_url, timing.clone());
        let creds = Credentials {
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            otp_seed: self.config.otp_seed.clone(),
        };
        auth.login(driver, &creds)
            .await
            .context("Authentication failed, aborting campaign")?;

        let search = SearchService::new(&self.config.app_url, timing.clone());
        let connect = ConnectService::new(
            Arc::clone(&self.ledger),
            timing.clone(),
            QuotaConfig {
                daily_limit: self.config.daily_limit,
                session_limit: self.config.session_limit,
            },
        );
        let messaging =
            MessagingService::new(&self.config.app_url, Arc::clone(&self.ledger), timing.clone());

        let results = search.search(driver, &self.query).await?;
        let search_url = format!("{}/search", self.config.app_url.trim_end_matches('/'));

        // One pass over the results: fresh profiles get a connection
        // request, already-connected ones get a greeting. Greetings leave
        // the results view, so the loop navigates back before moving on.
        for profile in &results {
            if token.is_cancelled() {
                info!("Shutdown requested, stopping outreach loop.");
                break;
            }

            if profile.connected {
                match messaging
                    .send_templated(
                        driver,
                        profile.id,
                        &profile.name,
                        &Self::template_vars(&profile.name, &profile.company),
                        &self.config.templates.greeting,
                    )
                    .await
                {
                    Ok(MessageOutcome::Sent) => {
                        stats.messaged += 1;
                        driver.navigate(&search_url).await?;
                        driver.wait_for_load().await?;
                    }
                    Ok(MessageOutcome::AlreadySent) => stats.skipped += 1,
                    Err(e) => {
                        warn!("Greeting failed for {}: {:?}", profile.name, e);
                        stats.failed += 1;
                        driver.navigate(&search_url).await?;
                        driver.wait_for_load().await?;
                    }
                }
                continue;
            }

            let note = render_template(
                &self.config.templates.connect_note,
                &Self::template_vars(&profile.name, &profile.company),
            );
            match connect.connect(driver, profile, &note).await {
                Ok(ConnectOutcome::Requested) => {
                    stats.requested += 1;
                    self.cooldown(&token).await;
                }
                Ok(ConnectOutcome::AlreadyRequested) => stats.skipped += 1,
                Err(e) => {
                    if let Some(CoreError::RateLimitExceeded { scope, used, limit }) =
                        e.downcast_ref::<CoreError>()
                    {
                        warn!(
                            "{} quota reached ({}/{}), stopping outreach for this run.",
                            scope, used, limit
                        );
                        stats.skipped += 1;
                        break;
                    }
                    warn!("Connect failed for {}: {:?}", profile.name, e);
                    stats.failed += 1;
                }
            }
        }

        // Sweep accepted requests and follow up on every connected
        // profile that has not been messaged yet.
        if !token.is_cancelled() {
            let promoted = messaging.scan_for_accepted(driver).await?;
            if !promoted.is_empty() {
                info!("{} connection(s) newly accepted.", promoted.len());
            }

            for row in self.ledger.pending_follow_ups().await? {
                if token.is_cancelled() {
                    break;
                }
                match messaging
                    .send_templated(
                        driver,
                        row.profile_id,
                        &row.name,
                        &Self::template_vars(&row.name, &row.company),
                        &self.config.templates.follow_up,
                    )
                    .await
                {
                    Ok(MessageOutcome::Sent) => stats.messaged += 1,
                    Ok(MessageOutcome::AlreadySent) => stats.skipped += 1,
                    Err(e) => {
                        warn!("Follow-up failed for {}: {:?}", row.name, e);
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}
