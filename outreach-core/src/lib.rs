//! # Outreach Core - Shared Engine for Outreach Campaigns
//!
//! This crate provides the campaign-agnostic machinery used by every bot
//! binary: the page driver abstraction, the login state machine, the
//! rate-limited workflows and the SQLite dedup/audit ledger.
//!
//! ## Modules
//!
//! - [`auth`] - Login state machine with 2FA puzzle solving and captcha abort
//! - [`config`] - Configuration structures for campaign setup
//! - [`driver`] - Page driver trait plus the scripted in-memory backend
//! - [`error`] - Typed error handling with thiserror
//! - [`ledger`] - Async SQLite ledger with connection pooling
//! - [`timing`] - Human-cadence delays, typing and scrolling
//! - [`traits`] - Core trait definitions
//! - [`workflow`] - Connect, messaging and search workflows

// Module declarations - internal modules marked pub(crate)
pub mod auth;
pub mod config;
pub mod driver;
pub mod error;
pub mod ledger;
pub mod timing;
pub mod traits;
pub(crate) mod utils;
pub mod workflow;

// Selective exports - only public API types
pub use auth::{solve_puzzle, Authenticator, Credentials};
pub use config::{MessageTemplates, OutreachConfig};
pub use driver::{try_find, PageDriver, PageElement, ScriptedDriver, SimProfile};
pub use error::{AuthError, ConfigError, CoreError, DriverError, LedgerError};
pub use ledger::{
    Connection, ConnectionStatus, Ledger, LedgerMetricsSnapshot, MessageRecord,
};
pub use timing::{HumanTiming, TimingProfile};
pub use traits::{Campaign, CampaignStats};
pub use workflow::{
    ConnectOutcome, ConnectService, MessageOutcome, MessagingService, ProfileSummary,
    SearchService,
};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{
    setup_logger, setup_logger_with_file, ActionQuota, CampaignRunner, QuotaConfig,
};

// Export retry utilities for testing
pub use utils::{with_retry, RetryConfig};
