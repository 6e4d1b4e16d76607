//! Search workflow: query submission and result card parsing.

use outreach_core::{
    HumanTiming, ScriptedDriver, SearchService, SimProfile, TimingProfile,
};
use tokio_util::sync::CancellationToken;

const BASE: &str = "http://localhost:8080";

fn fast_timing() -> HumanTiming {
    HumanTiming::with_profile(TimingProfile::fast(), CancellationToken::new())
}

#[tokio::test]
async fn search_parses_result_cards() {
    let driver = ScriptedDriver::new(BASE)
        .with_profile(SimProfile::new(1, "Alice Smith", "Engineer", "TechNova"))
        .with_profile(SimProfile::new(2, "Bob Jones", "Analyst", "FinLeap").connected());
    driver.mark_logged_in();

    let svc = SearchService::new(BASE, fast_timing());
    let results = svc.search(&driver, "engineer").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, 1);
    assert_eq!(results[0].name, "Alice Smith");
    assert_eq!(results[0].title, "Engineer");
    assert_eq!(results[0].company, "TechNova");
    assert!(!results[0].connected);

    assert_eq!(results[1].id, 2);
    assert!(results[1].connected);

    assert_eq!(driver.typed("#search-input").unwrap(), "engineer");
}

#[tokio::test]
async fn empty_results_are_not_an_error() {
    let driver = ScriptedDriver::new(BASE);
    driver.mark_logged_in();

    let svc = SearchService::new(BASE, fast_timing());
    let results = svc.search(&driver, "nobody").await.unwrap();
    assert!(results.is_empty());
}
