//! # Utilities Module
//!
//! Internal utility modules for the outreach-core crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod rate_limiter;
pub(crate) mod retry;
pub(crate) mod runner;

// Selective exports - only public utilities
pub use logger::{setup_logger, setup_logger_with_file};
pub use rate_limiter::{ActionQuota, QuotaConfig};
pub use retry::{with_retry, RetryConfig};
pub use runner::CampaignRunner;
