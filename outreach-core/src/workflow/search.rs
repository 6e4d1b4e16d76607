//! Search workflow: runs a people query and parses the result cards into
//! [`ProfileSummary`] values for the connect workflow.

use crate::driver::PageDriver;
use crate::timing::HumanTiming;
use crate::workflow::ProfileSummary;
use anyhow::Result;
use tracing::{debug, info, warn};

const SEARCH_INPUT: &str = "#search-input";
const RESULT_ITEM: &str = ".result-item";

pub struct SearchService {
    base_url: String,
    timing: HumanTiming,
}

impl SearchService {
    pub fn new(base_url: &str, timing: HumanTiming) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timing,
        }
    }

    /// Types `query` into the search box, submits it and scrapes the
    /// result cards. Cards that fail to parse are skipped with a warning
    /// rather than failing the whole search.
    pub async fn search(&self, driver: &dyn PageDriver, query: &str) -> Result<Vec<ProfileSummary>> {
        info!("Searching for: {}", query);
        driver.navigate(&format!("{}/search", self.base_url)).await?;
        driver.wait_for_load().await?;

        self.timing.type_into(driver, SEARCH_INPUT, query).await?;
        driver.keyboard_press("Enter").await?;
        driver.wait_for_load().await?;

        self.timing.think_delay(1000, 2000).await;
        // Skim the results like a reader would before acting on them.
        self.timing.random_scroll(driver).await?;

        let cards = driver.find_elements(RESULT_ITEM).await?;
        let mut profiles = Vec::new();
        for card in cards {
            let text = card.text().await?;
            let id = card.attribute("data-id").await?;
            match parse_result_card(&text, id.as_deref()) {
                Some(profile) => {
                    debug!(
                        "Parsed result: {} ({} at {})",
                        profile.name, profile.title, profile.company
                    );
                    profiles.push(profile);
                }
                None => warn!("Skipping unparseable result card: {:?}", text),
            }
        }

        info!("Search returned {} usable results", profiles.len());
        Ok(profiles)
    }
}

/// Result cards render as a name line followed by a `Title at Company`
/// line; already-connected profiles carry a status line as well.
fn parse_result_card(text: &str, data_id: Option<&str>) -> Option<ProfileSummary> {
    let id = data_id?.parse::<i64>().ok()?;

    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let name = lines.next()?.to_string();
    let headline = lines.next().unwrap_or_default();

    let (title, company) = match headline.split_once(" at ") {
        Some((title, company)) => (title.to_string(), company.to_string()),
        None => (headline.to_string(), String::new()),
    };

    let connected = text.contains("NETWORK SYNCED") || text.contains("Connected");

    Some(ProfileSummary {
        id,
        name,
        title,
        company,
        connected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_parses_name_title_company() {
        let profile =
            parse_result_card("Alice Smith\nEngineer at TechNova", Some("1")).unwrap();
        assert_eq!(profile.id, 1);
        assert_eq!(profile.name, "Alice Smith");
        assert_eq!(profile.title, "Engineer");
        assert_eq!(profile.company, "TechNova");
        assert!(!profile.connected);
    }

    #[test]
    fn card_detects_connected_status() {
        let profile = parse_result_card(
            "Bob Jones\nAnalyst at FinLeap\nNETWORK SYNCED",
            Some("2"),
        )
        .unwrap();
        assert!(profile.connected);
    }

    #[test]
    fn card_without_id_is_rejected() {
        assert!(parse_result_card("Alice Smith\nEngineer at TechNova", None).is_none());
        assert!(parse_result_card("Alice\nEngineer at X", Some("nope")).is_none());
    }

    #[test]
    fn headline_without_separator_becomes_title_only() {
        let profile = parse_result_card("Carol Diaz\nFounder", Some("3")).unwrap();
        assert_eq!(profile.title, "Founder");
        assert_eq!(profile.company, "");
    }
}
