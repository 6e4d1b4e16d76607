//! Connect workflow: quota gate, ledger dedup, retried button targeting,
//! note typing with human cadence and durable persistence of the result.

use crate::driver::PageDriver;
use crate::error::DriverError;
use crate::ledger::Ledger;
use crate::timing::HumanTiming;
use crate::utils::rate_limiter::{ActionQuota, QuotaConfig};
use crate::utils::retry::{with_retry, RetryConfig};
use crate::workflow::ProfileSummary;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Hard cap on the personalization note.
pub const MAX_NOTE_LEN: usize = 300;

const NOTE_FIELD: &str = "#note-text";
const SEND_NOTE: &str = "#send-note";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The request was dispatched and persisted.
    Requested,
    /// A connection row already existed; nothing touched the page.
    AlreadyRequested,
}

pub struct ConnectService {
    ledger: Arc<Ledger>,
    timing: HumanTiming,
    quota: Mutex<ActionQuota>,
    retry: RetryConfig,
}

impl ConnectService {
    pub fn new(ledger: Arc<Ledger>, timing: HumanTiming, quota: QuotaConfig) -> Self {
        Self {
            ledger,
            timing,
            quota: Mutex::new(ActionQuota::new(quota)),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sends a connection request to `profile` from the current search
    /// results view (no page navigation). Idempotent per profile id and
    /// gated by the daily quota; both checks happen before any driver
    /// interaction.
    pub async fn connect(
        &self,
        driver: &dyn PageDriver,
        profile: &ProfileSummary,
        note: &str,
    ) -> Result<ConnectOutcome> {
        info!(
            "Starting connection workflow for {} (ID: {})",
            profile.name, profile.id
        );

        // 1. Daily/session quota, authoritative count from the ledger.
        let quota = self.quota.lock().await;
        let used = quota.try_reserve(&self.ledger).await?;
        let daily_limit = quota.daily_limit();
        drop(quota);

        // 2. Dedup: an existing row of any status makes this a no-op.
        if self.ledger.is_requested(profile.id).await? {
            info!("Already sent request to {}, skipping", profile.name);
            return Ok(ConnectOutcome::AlreadyRequested);
        }

        info!("Locating connection target on current page: {}", profile.name);
        self.log_activity(
            "Action",
            &format!("Connecting to {} from search results", profile.name),
        )
        .await;

        // 3. Locate and click, retried against UI state sync delays.
        let selector = format!(".connect-btn[data-id='{}']", profile.id);
        with_retry(&self.retry, "Click Connect", self.timing.token(), || {
            let selector = selector.clone();
            async move {
                let button = driver.find_element(&selector).await?;
                if !button.visible().await? {
                    button.scroll_into_view().await?;
                }
                button.click().await
            }
        })
        .await?;

        self.timing.think_delay(800, 1600).await;

        // 4. Note hygiene: hard cap plus a generic default for empty input.
        info!("Applying personalized invitation note...");
        let note = if note.chars().count() > MAX_NOTE_LEN {
            warn!("Note truncated to {} characters", MAX_NOTE_LEN);
            note.chars().take(MAX_NOTE_LEN).collect::<String>()
        } else if note.is_empty() {
            format!(
                "Hi {}, I saw your profile and would love to connect!",
                profile.name
            )
        } else {
            note.to_string()
        };

        // 5. Human-cadence typing into the note modal.
        self.log_activity("Action", &format!("Typing note for {}", profile.name))
            .await;
        self.timing.type_into(driver, NOTE_FIELD, &note).await?;
        self.timing.think_delay(1200, 2500).await;

        // 6. Dispatch. The send control must actually be interactable.
        info!("Dispatching connection request...");
        let send = driver.find_element(SEND_NOTE).await?;
        if !send.visible().await? {
            return Err(DriverError::Obstructed {
                selector: SEND_NOTE.to_string(),
            }
            .into());
        }

        self.log_activity(
            "Action",
            &format!("Dispatching request to {}", profile.name),
        )
        .await;
        send.click().await?;

        // UI settle is best-effort; a timeout here is not a failure.
        if let Err(e) = driver.wait_idle(Duration::from_secs(5)).await {
            warn!("UI state sync delay detected after dispatch: {}", e);
        }

        // 7. Persist regardless of the settle outcome. The in-page action
        // already happened and cannot be undone, so a storage failure is
        // critical but non-fatal.
        if let Err(e) = self
            .ledger
            .mark_requested(profile.id, &profile.name, &profile.title, &profile.company)
            .await
        {
            error!(
                "Critical: persistence failure for {}: {:?}",
                profile.name, e
            );
        }
        self.quota.lock().await.record_success();
        self.log_activity(
            "Success",
            &format!("Connection request sent to {}", profile.name),
        )
        .await;

        info!(
            "Request dispatched for {}. Quota: {}/{}",
            profile.name,
            used + 1,
            daily_limit
        );
        Ok(ConnectOutcome::Requested)
    }

    /// Audit-trail writes never fail the workflow.
    async fn log_activity(&self, action_type: &str, metadata: &str) {
        if let Err(e) = self.ledger.log_activity(action_type, metadata).await {
            warn!("Activity log write failed: {:?}", e);
        }
    }
}
