//! Messaging workflow: templated follow-ups with per-profile dedup, plus
//! the acceptance scan that promotes `requested` rows to `connected`.

use crate::driver::{try_find, PageDriver};
use crate::error::DriverError;
use crate::ledger::{ConnectionStatus, Ledger};
use crate::timing::HumanTiming;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MESSAGE_FIELD: &str = "#message-text";
const SEND_BUTTON: &str = "#send-btn";
const MESSAGE_CONTAINER: &str = "#message-container";
const CONNECTION_LIST_LINKS: &str = "#connection-list a";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Sent,
    /// A follow-up was already on record for this profile.
    AlreadySent,
}

/// Expands `{{key}}` placeholders from `vars`. Placeholders with no
/// matching key stay literal, so a typo in a template is visible in the
/// sent text rather than silently blanked.
pub fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

pub struct MessagingService {
    base_url: String,
    ledger: Arc<Ledger>,
    timing: HumanTiming,
}

impl MessagingService {
    pub fn new(base_url: &str, ledger: Arc<Ledger>, timing: HumanTiming) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ledger,
            timing,
        }
    }

    /// Sends one rendered follow-up to `profile_id`, at most once ever
    /// per profile. The dedup check runs before any navigation.
    pub async fn send_templated(
        &self,
        driver: &dyn PageDriver,
        profile_id: i64,
        name: &str,
        vars: &HashMap<&str, String>,
        template: &str,
    ) -> Result<MessageOutcome> {
        if self.ledger.has_sent_follow_up(profile_id).await? {
            info!("Follow-up already sent to {}, skipping", name);
            return Ok(MessageOutcome::AlreadySent);
        }

        let message = render_template(template, vars);

        info!("Opening message thread for {} (ID: {})", name, profile_id);
        driver
            .navigate(&format!("{}/messages?id={}", self.base_url, profile_id))
            .await?;
        driver.wait_for_load().await?;

        self.timing.think_delay(1000, 2000).await;
        self.timing.type_into(driver, MESSAGE_FIELD, &message).await?;
        self.timing.think_delay(800, 1500).await;

        let send = driver.find_element(SEND_BUTTON).await?;
        if !send.visible().await? {
            return Err(DriverError::Obstructed {
                selector: SEND_BUTTON.to_string(),
            }
            .into());
        }
        send.click().await?;

        if let Err(e) = driver.wait_idle(Duration::from_secs(5)).await {
            warn!("UI state sync delay detected after send: {}", e);
        }

        // Soft verification only: the thread view may render the message
        // late or not at all, and the send already happened.
        match try_find(driver, MESSAGE_CONTAINER).await {
            Ok(Some(container)) => {
                let rendered = container.text().await.unwrap_or_default();
                if !rendered.contains(&message) {
                    warn!("Sent message not visible in thread for {}", name);
                }
            }
            Ok(None) => warn!("Message thread container missing after send"),
            Err(e) => warn!("Could not verify thread contents: {}", e),
        }

        // Persistence failure after a real send is critical but non-fatal:
        // the message is out, and aborting here would only lose the record.
        if let Err(e) = self
            .ledger
            .mark_message_sent(profile_id, "bot", "follow_up", &message)
            .await
        {
            error!("Critical: persistence failure for message to {}: {:?}", name, e);
        }
        if let Err(e) = self
            .ledger
            .log_activity("Success", &format!("Follow-up sent to {}", name))
            .await
        {
            warn!("Activity log write failed: {:?}", e);
        }

        info!("Follow-up delivered to {}", name);
        Ok(MessageOutcome::Sent)
    }

    /// Reads the connection list page and promotes every ledger row found
    /// there to `connected`. Profiles on the page with no ledger row are
    /// recorded directly as `connected` (accepted out-of-band).
    pub async fn scan_for_accepted(&self, driver: &dyn PageDriver) -> Result<Vec<i64>> {
        info!("Scanning connection list for accepted requests...");
        driver
            .navigate(&format!("{}/connections", self.base_url))
            .await?;
        driver.wait_for_load().await?;

        let links = driver.find_elements(CONNECTION_LIST_LINKS).await?;
        let mut promoted = Vec::new();

        for link in links {
            let href = match link.attribute("href").await? {
                Some(href) => href,
                None => continue,
            };
            let id = match parse_profile_href(&href) {
                Some(id) => id,
                None => {
                    debug!("Skipping unparseable connection link: {}", href);
                    continue;
                }
            };

            match self.ledger.connection(id).await? {
                Some(row) if row.status == ConnectionStatus::Requested.as_str() => {
                    info!("Request accepted by {} (ID: {})", row.name, id);
                    self.ledger
                        .update_status(id, ConnectionStatus::Connected)
                        .await?;
                    promoted.push(id);
                }
                Some(_) => {}
                None => {
                    let name = link.text().await.unwrap_or_default();
                    debug!("Unknown connection {} (ID: {}), recording directly", name, id);
                    self.ledger
                        .upsert_connection(id, &name, "", "", ConnectionStatus::Connected)
                        .await?;
                    promoted.push(id);
                }
            }
        }

        info!("Acceptance scan complete: {} newly connected", promoted.len());
        Ok(promoted)
    }
}

/// Extracts the numeric id from a `/profile/{id}` href.
fn parse_profile_href(href: &str) -> Option<i64> {
    href.rsplit_once("/profile/")
        .and_then(|(_, id)| id.parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_known_keys() {
        let mut vars = HashMap::new();
        vars.insert("name", "Alice".to_string());
        assert_eq!(
            render_template("Hi {{name}}, thanks!", &vars),
            "Hi Alice, thanks!"
        );
    }

    #[test]
    fn template_leaves_unknown_keys_literal() {
        let vars = HashMap::new();
        assert_eq!(
            render_template("Hi {{name}}!", &vars),
            "Hi {{name}}!"
        );
    }

    #[test]
    fn profile_href_parses_trailing_id() {
        assert_eq!(parse_profile_href("/profile/42"), Some(42));
        assert_eq!(parse_profile_href("http://localhost/profile/7"), Some(7));
        assert_eq!(parse_profile_href("/connections"), None);
        assert_eq!(parse_profile_href("/profile/abc"), None);
    }
}
