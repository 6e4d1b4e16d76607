//! # Action Orchestrator
//!
//! The rate-limited, deduplicated workflows: connect requests with
//! personalized notes, templated messaging with follow-up dedup, the
//! acceptance scan and the search step that feeds targets into all of
//! them. Every decision re-queries the [`Ledger`](crate::ledger::Ledger);
//! no durable state is cached across calls.

pub mod connect;
pub mod messaging;
pub mod search;

pub use connect::{ConnectOutcome, ConnectService};
pub use messaging::{render_template, MessageOutcome, MessagingService};
pub use search::SearchService;

/// One target profile as parsed from the search results view.
#[derive(Debug, Clone)]
pub struct ProfileSummary {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub company: String,
    pub connected: bool,
}
