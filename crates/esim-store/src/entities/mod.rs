//! Database layer.
//!
//! [`SimStore`] owns the SQLite pool; each record kind gets its own store
//! trait ([`TaskStore`], [`SpiceFileStore`], [`RuntimeStatStore`]) so a
//! different backend can be dropped in without touching callers.
//!
//! All trait methods use `impl Future` in their signatures, so no extra
//! `async-trait` crate is required.

pub mod dao;
pub mod runtime_stat;
pub mod spice_file;
pub mod task;

pub use dao::{RuntimeStatRecord, SpiceFileRecord, TaskRecord};

pub use runtime_stat::RuntimeStatStore;
pub use spice_file::SpiceFileStore;
pub use task::TaskStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

/// SQLite-backed store for tasks, uploaded files and runtime statistics.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct SimStore {
    pool: SqlitePool,
}

impl SimStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://esim.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = is_in_memory(url);
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is a separate database, so pin to one
        // connection that never gets recycled.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(database_url = %url, "simulation store ready");
        Ok(Self { pool })
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// `sqlite::memory:` and `file:...?mode=memory` URIs both open a private
/// database per connection.
fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

// ── column codecs ────────────────────────────────────────────────────────────

/// Current time at the precision the store persists.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339, so lexical order in SQLite equals time order.
pub(crate) fn encode_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(column: &'static str, raw: String) -> Result<DateTime<Utc>, StoreError> {
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => Err(StoreError::Decode { column, raw }),
    }
}

pub(crate) fn decode_uuid(column: &'static str, raw: String) -> Result<Uuid, StoreError> {
    match Uuid::parse_str(&raw) {
        Ok(id) => Ok(id),
        Err(_) => Err(StoreError::Decode { column, raw }),
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SimStore {
    SimStore::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory store")
}
