use outreach_core::{Ledger, OutreachConfig, ScriptedDriver, SimProfile};
use std::sync::Arc;

/// Builds the scripted demo session: a handful of seeded profiles, one of
/// them already connected, with the bot's ledger attached so accepted
/// requests fire the application-side auto-greeting.
pub fn build_session(config: &OutreachConfig, ledger: Arc<Ledger>) -> ScriptedDriver {
    ScriptedDriver::new(&config.app_url)
        .with_credentials(&config.username, &config.password)
        .with_profile(SimProfile::new(1, "Alice Smith", "Senior Engineer", "TechNova"))
        .with_profile(SimProfile::new(2, "Bob Jones", "Product Manager", "FinLeap"))
        .with_profile(SimProfile::new(3, "Carol Diaz", "Data Scientist", "Quantify"))
        .with_profile(SimProfile::new(4, "Dan Lee", "Designer", "PixelWorks").connected())
        .with_profile(SimProfile::new(5, "Eve Chen", "Founder", "Seedling"))
        .with_ledger(ledger)
}
