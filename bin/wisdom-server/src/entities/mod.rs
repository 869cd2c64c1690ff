//! Persistence layer.
//!
//! The store interface is split by concern ([`UserStore`],
//! [`ConversationStore`], [`MessageStore`], [`AnalyticsStore`]) and has three
//! implementations:
//!
//! - [`SqlStore`]: the relational store (SQLite through sqlx).
//! - [`FileStore`]: JSON files on local disk, used when the relational store is
//!   not configured or not reachable.
//! - [`ResilientStore`]: what handlers talk to. It bounds every relational call
//!   with a timeout and routes failures to the file store.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required at this seam.

pub mod analytics;
pub mod conversation;
pub mod dao;
pub mod file;
pub mod message;
pub mod resilient;
pub mod user;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use analytics::AnalyticsStore;
pub use conversation::ConversationStore;
pub use dao::{
    AnalyticsEvent, ConversationPatch, ConversationRecord, EventType, MessageRecord, PopularMessage,
    SavedChat, UserRecord, UserStats,
};
pub use file::FileStore;
pub use message::MessageStore;
pub use resilient::ResilientStore;
pub use user::UserStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("file store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store operation `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("{0} not found")]
    NotFound(String),
}

/// Relational store backed by SQLite.
#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://wisdom.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every connection to an in-memory database is a separate database.
        let max_connections = if url.contains(":memory:") || url.contains("mode=memory") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Close the pool; every later query fails.
    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}

pub(crate) fn parse_language(raw: &str) -> crate::language::Language {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(raw = %raw, "unknown stored language; using english");
        crate::language::Language::English
    })
}
