//! # Dedup/Audit Ledger
//!
//! Durable store of connection status, sent messages and the append-only
//! activity log. SQLite via sqlx with WAL journaling, so the pool stays
//! safe under concurrent writers (the target application can write
//! auto-greetings while the main flow runs).
//!
//! Every operation is independently atomic; check-then-act ordering is the
//! orchestrator's responsibility. The orchestrator holds no durable state
//! of its own and re-queries this ledger for every decision.

use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::error::LedgerError;

/// Lifecycle of a connection row: created as `Requested` by the connect
/// workflow (or directly `Connected` by the acceptance scan), promoted to
/// `Connected`, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Requested,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Requested => "requested",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per target profile ever acted on.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Connection {
    pub profile_id: i64,
    pub name: String,
    pub title: String,
    pub company: String,
    pub status: String,
    pub created_at: i64,
}

/// Append-only record of one sent message.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub profile_id: i64,
    pub sender: String,
    pub message_type: String,
    pub content: String,
    pub sent_at: i64,
}

#[derive(Debug, Default)]
pub struct LedgerMetrics {
    pub total_queries: AtomicU64,
    pub total_errors: AtomicU64,
    pub total_inserts: AtomicU64,
    pub total_selects: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct LedgerMetricsSnapshot {
    pub total_queries: u64,
    pub total_errors: u64,
    pub total_inserts: u64,
    pub total_selects: u64,
}

impl LedgerMetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_queries as f64 * 100.0
        }
    }
}

#[derive(Debug)]
pub struct Ledger {
    pool: SqlitePool,
    metrics: Arc<LedgerMetrics>,
}

/// Unix timestamp of local midnight; rows at or after it were created
/// "today" in the operator's calendar.
fn start_of_local_day() -> i64 {
    let now = Local::now();
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| now.timestamp())
}

impl Ledger {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

    pub async fn open(db_path: &str) -> Result<Self> {
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path).map_err(|e| LedgerError::Io {
                path: db_path.to_string(),
                msg: e.to_string(),
            })?;
            info!("Created new ledger file: {}", db_path);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(Self::DEFAULT_TIMEOUT_MS))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode=WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous=NORMAL;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}", db_path))
            .await
            .map_err(|e| LedgerError::QueryFailed { msg: e.to_string() })?;

        let ledger = Self {
            pool,
            metrics: Arc::new(LedgerMetrics::default()),
        };
        ledger.init_schema().await?;
        info!(
            "Ledger initialized with pool size {} (WAL mode)",
            Self::DEFAULT_MAX_CONNECTIONS
        );
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|_| LedgerError::PoolExhausted {
                max_size: Self::DEFAULT_MAX_CONNECTIONS,
            })?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS connections (
                profile_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_type TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id INTEGER NOT NULL,
                sender TEXT NOT NULL,
                message_type TEXT NOT NULL,
                content TEXT NOT NULL,
                sent_at INTEGER NOT NULL
            );",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| LedgerError::QueryFailed { msg: e.to_string() })?;

        self.create_indexes().await?;
        Ok(())
    }

    async fn create_indexes(&self) -> Result<()> {
        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_connections_status ON connections(status);",
            "CREATE INDEX IF NOT EXISTS idx_connections_created ON connections(created_at);",
            "CREATE INDEX IF NOT EXISTS idx_messages_profile_type ON messages(profile_id, message_type);",
            "CREATE INDEX IF NOT EXISTS idx_activity_created ON activity_log(created_at);",
        ];

        for idx_sql in indexes {
            sqlx::query(idx_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| LedgerError::QueryFailed { msg: e.to_string() })?;
        }
        Ok(())
    }

    /// Last-write-wins upsert: a later write for the same profile replaces
    /// the prior row, resetting `created_at`. Callers check before
    /// re-inserting a row whose status should be preserved.
    pub async fn upsert_connection(
        &self,
        profile_id: i64,
        name: &str,
        title: &str,
        company: &str,
        status: ConnectionStatus,
    ) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT OR REPLACE INTO connections (profile_id, name, title, company, status, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(profile_id)
        .bind(name)
        .bind(title)
        .bind(company)
        .bind(status.as_str())
        .bind(timestamp)
        .execute(&self.pool)
        .await;

        self.metrics.total_inserts.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(_) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                error!("Failed to upsert connection {}: {}", profile_id, e);
                Err(e).context("Failed to upsert connection row")
            }
        }
    }

    pub async fn mark_requested(
        &self,
        profile_id: i64,
        name: &str,
        title: &str,
        company: &str,
    ) -> Result<()> {
        self.upsert_connection(profile_id, name, title, company, ConnectionStatus::Requested)
            .await
    }

    /// Whether any connection row exists for this profile, regardless of
    /// status.
    pub async fn is_requested(&self, profile_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM connections WHERE profile_id = ?",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match row {
            Ok((count,)) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(count > 0)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to check connection row")
            }
        }
    }

    /// Requests created since local midnight. This count is the single
    /// authoritative source for the daily quota.
    pub async fn todays_request_count(&self) -> Result<u32> {
        let since = start_of_local_day();
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM connections WHERE status = 'requested' AND created_at >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match row {
            Ok((count,)) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(count as u32)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to count today's requests")
            }
        }
    }

    /// Status mutation that preserves `created_at` (unlike the upsert).
    pub async fn update_status(&self, profile_id: i64, status: ConnectionStatus) -> Result<()> {
        let result = sqlx::query("UPDATE connections SET status = ? WHERE profile_id = ?")
            .bind(status.as_str())
            .bind(profile_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to update connection status")
            }
        }
    }

    pub async fn has_sent_follow_up(&self, profile_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM messages WHERE profile_id = ? AND message_type = 'follow_up'",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match row {
            Ok((count,)) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(count > 0)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to check follow-up history")
            }
        }
    }

    pub async fn mark_message_sent(
        &self,
        profile_id: i64,
        sender: &str,
        message_type: &str,
        content: &str,
    ) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO messages (profile_id, sender, message_type, content, sent_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(profile_id)
        .bind(sender)
        .bind(message_type)
        .bind(content)
        .bind(timestamp)
        .execute(&self.pool)
        .await;

        self.metrics.total_inserts.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(_) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                error!("Failed to record message for {}: {}", profile_id, e);
                Err(e).context("Failed to insert message row")
            }
        }
    }

    /// Connected profiles that have not received a follow-up yet.
    /// Recomputed on every call; never cached.
    pub async fn pending_follow_ups(&self) -> Result<Vec<Connection>> {
        let rows = sqlx::query_as::<_, Connection>(
            "SELECT profile_id, name, title, company, status, created_at FROM connections
             WHERE status = 'connected'
             AND profile_id NOT IN (SELECT profile_id FROM messages WHERE message_type = 'follow_up')",
        )
        .fetch_all(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match rows {
            Ok(rows) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(rows)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to query pending follow-ups")
            }
        }
    }

    /// Append-only audit trail, never mutated or deleted.
    pub async fn log_activity(&self, action_type: &str, metadata: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO activity_log (action_type, metadata, created_at) VALUES (?, ?, ?)",
        )
        .bind(action_type)
        .bind(metadata)
        .bind(timestamp)
        .execute(&self.pool)
        .await;

        self.metrics.total_inserts.fetch_add(1, Ordering::SeqCst);
        match result {
            Ok(_) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                error!("Failed to append activity log entry: {}", e);
                Err(e).context("Failed to insert activity log entry")
            }
        }
    }

    pub async fn messages_for_profile(&self, profile_id: i64) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, profile_id, sender, message_type, content, sent_at FROM messages
             WHERE profile_id = ? ORDER BY sent_at ASC, id ASC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match rows {
            Ok(rows) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(rows)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to query message history")
            }
        }
    }

    pub async fn connection(&self, profile_id: i64) -> Result<Option<Connection>> {
        let row = sqlx::query_as::<_, Connection>(
            "SELECT profile_id, name, title, company, status, created_at FROM connections WHERE profile_id = ?",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await;

        self.metrics.total_selects.fetch_add(1, Ordering::SeqCst);
        match row {
            Ok(row) => {
                self.metrics.total_queries.fetch_add(1, Ordering::SeqCst);
                Ok(row)
            }
            Err(e) => {
                self.metrics.total_errors.fetch_add(1, Ordering::SeqCst);
                Err(e).context("Failed to fetch connection row")
            }
        }
    }

    pub fn metrics_snapshot(&self) -> LedgerMetricsSnapshot {
        LedgerMetricsSnapshot {
            total_queries: self.metrics.total_queries.load(Ordering::SeqCst),
            total_errors: self.metrics.total_errors.load(Ordering::SeqCst),
            total_inserts: self.metrics.total_inserts.load(Ordering::SeqCst),
            total_selects: self.metrics.total_selects.load(Ordering::SeqCst),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
