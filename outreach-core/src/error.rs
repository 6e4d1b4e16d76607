//! # Core Error Types
//!
//! Centralized error definitions for the outreach-core crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for outreach-core operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Driver(DriverError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error(transparent)]
    Config(ConfigError),

    /// Expected control-flow signal, not a bug: the caller skips the
    /// current target and moves on.
    #[error("{scope} action limit reached ({used}/{limit})")]
    RateLimitExceeded {
        scope: &'static str,
        used: u32,
        limit: u32,
    },
}

impl From<AuthError> for CoreError {
    fn from(e: AuthError) -> Self {
        CoreError::Auth(e)
    }
}

impl From<DriverError> for CoreError {
    fn from(e: DriverError) -> Self {
        CoreError::Driver(e)
    }
}

impl From<LedgerError> for CoreError {
    fn from(e: LedgerError) -> Self {
        CoreError::Ledger(e)
    }
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

/// Authentication state-machine errors. All of these are fatal to the
/// login attempt; `CaptchaDetected` additionally aborts the entire run
/// and is never retried.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("captcha checkpoint detected - automation paused, no bypass attempted")]
    CaptchaDetected,

    #[error("login rejected: {message}")]
    Credential { message: String },

    #[error("two-factor verification failed: {message}")]
    TwoFactor { message: String },

    #[error("failed to reach dashboard, still at '{url}'")]
    DashboardUnreachable { url: String },

    #[error("invalid puzzle format: '{text}' (expected 'N1 OP N2')")]
    PuzzleFormat { text: String },

    #[error("puzzle operand '{token}' is not a base-10 integer")]
    PuzzleNumber { token: String },

    #[error("unknown puzzle operator: '{op}'")]
    PuzzleOperator { op: String },
}

/// Failures reported by the page automation driver.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("element not found: '{selector}'")]
    Missing { selector: String },

    #[error("element '{selector}' is obstructed or non-visible")]
    Obstructed { selector: String },

    #[error("interaction with '{selector}' failed: {reason}")]
    Interaction { selector: String, reason: String },

    #[error("page did not settle within {timeout_ms}ms")]
    SettleTimeout { timeout_ms: u64 },
}

/// Durable storage errors. After a page action has been dispatched these
/// are logged as critical and swallowed - the real-world action cannot
/// be rolled back.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("connection pool exhausted (max: {max_size})")]
    PoolExhausted { max_size: u32 },

    #[error("query failed: {msg}")]
    QueryFailed { msg: String },

    #[error("I/O error at {path}: {msg}")]
    Io { path: String, msg: String },
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}
