//! Durable storage for pages, learning bits, rules, jobs, and search logs.
//!
//! Backed by libSQL (local SQLite file or `:memory:`). The store owns the
//! schema and every persisted entity; the rest of the pipeline only holds
//! in-memory working state. All operations share one connection (an
//! in-memory database exists per connection, so handing out fresh ones
//! would fork the data); writes are additionally serialized through a
//! single writer lock so transactions never interleave.

mod bits;
mod jobs;
mod pages;
mod rules;
mod schema;
mod stats;
mod thresholds;

pub use schema::SCHEMA_VERSION;

use crate::core::error::{CrawlError, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How often a failed statement is re-attempted before the store reports
/// itself unavailable.
const MAX_RETRIES: u32 = 3;
/// Initial backoff delay for a failed statement.
const RETRY_INITIAL_DELAY_MS: u64 = 100;
/// Total retry budget before the store reports itself unavailable.
const RETRY_MAX_ELAPSED_SECS: u64 = 5;

pub struct Store {
    _db: Arc<Database>,
    conn: Connection,
    /// Single-writer guard: all mutating operations take this lock so
    /// writes are serialized regardless of caller concurrency.
    write_lock: Arc<Mutex<()>>,
    path: String,
}

impl Store {
    /// Open (and migrate) the store at `path`. `:memory:` is accepted for
    /// ephemeral stores.
    pub async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CrawlError::StoreUnavailable(format!("open {}: {}", path, e)))?;
        let conn = db
            .connect()
            .map_err(|e| CrawlError::StoreUnavailable(format!("connect {}: {}", path, e)))?;

        let store = Self {
            _db: Arc::new(db),
            conn,
            write_lock: Arc::new(Mutex::new(())),
            path: path.to_string(),
        };
        store.migrate().await?;
        info!("learning store ready at {}", path);
        Ok(store)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    pub(crate) async fn write_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Apply pending migrations. Idempotent: each step is gated by the
    /// `schema_migrations` table and every statement is `IF NOT EXISTS`.
    async fn migrate(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(schema::CREATE_MIGRATIONS_TABLE, ())
            .await
            .map_err(store_err)?;

        let mut rows = conn
            .query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", ())
            .await
            .map_err(store_err)?;
        let current: i64 = match rows.next().await.map_err(store_err)? {
            Some(row) => row.get(0).map_err(store_err)?,
            None => 0,
        };

        if current >= schema::SCHEMA_VERSION {
            debug!("schema already at version {}", current);
            return Ok(());
        }

        info!(
            "migrating schema from version {} to {}",
            current,
            schema::SCHEMA_VERSION
        );

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(store_err)?;
        for stmt in schema::MIGRATION_V1 {
            if let Err(e) = conn.execute(stmt, ()).await {
                let _ = conn.execute("ROLLBACK", ()).await;
                return Err(store_err(e));
            }
        }
        if let Err(e) = conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations (version) VALUES (?)",
                libsql::params![schema::SCHEMA_VERSION],
            )
            .await
        {
            let _ = conn.execute("ROLLBACK", ()).await;
            return Err(store_err(e));
        }
        conn.execute("COMMIT", ()).await.map_err(store_err)?;

        // Seed the singleton thresholds row so readers never see an empty
        // table.
        let defaults = crate::core::types::AdaptiveThresholds::default();
        conn.execute(
            "INSERT OR IGNORE INTO adaptive_thresholds (id, min_importance, min_confidence, category_bonuses) VALUES (1, ?, ?, '{}')",
            libsql::params![defaults.min_importance_to_store, defaults.min_confidence_to_store],
        )
        .await
        .map_err(store_err)?;

        Ok(())
    }

    /// Run a write closure with exponential-backoff retries on transient
    /// I/O failures. Anything still failing after [`MAX_RETRIES`]
    /// attempts (or once the elapsed budget is spent) surfaces as
    /// `StoreUnavailable`; non-storage errors never retry.
    pub(crate) async fn with_retries<F, Fut, T>(&self, label: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(RETRY_INITIAL_DELAY_MS))
                .with_max_interval(Duration::from_secs(2))
                .with_max_elapsed_time(Some(Duration::from_secs(RETRY_MAX_ELAPSED_SECS)))
                .build(),
            || {
                attempt += 1;
                let current = attempt;
                let op = &op;
                async move {
                    op().await.map_err(|e| match e {
                        e @ CrawlError::StoreUnavailable(_) if current < MAX_RETRIES => {
                            warn!(
                                "store op '{}' failed (attempt {}/{}): {} — backing off",
                                label, current, MAX_RETRIES, e
                            );
                            backoff::Error::transient(e)
                        }
                        other => backoff::Error::permanent(other),
                    })
                }
            },
        )
        .await
    }
}

pub(crate) fn store_err(e: libsql::Error) -> CrawlError {
    CrawlError::StoreUnavailable(e.to_string())
}

pub(crate) fn ts_to_datetime(ts: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(ts, 0).unwrap_or_else(chrono::Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let path = path.to_str().unwrap();

        {
            let store = Store::open(path).await.unwrap();
            assert_eq!(store.path(), path);
        }
        // Second open re-runs migration against the same file.
        let store = Store::open(path).await.unwrap();
        let thresholds = store.get_thresholds().await.unwrap();
        assert!(thresholds.min_importance_to_store > 0.0);
    }

    #[tokio::test]
    async fn memory_store_migrates() {
        let store = Store::open(":memory:").await.unwrap();
        let rules = store.list_rules(true).await.unwrap();
        assert!(rules.is_empty());
    }
}
