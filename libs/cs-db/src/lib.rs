#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Common Sense database crate.
//!
//! Thin, typed layer over a `SQLx` `SQLite` pool:
//! - connect from a DSN or a [`DbConfig`] section (typed connect options, no
//!   DSN string rewriting)
//! - typed journaling and sync PRAGMAs from config
//! - explicit transactions with commit / rollback
//!
//! # Example
//! ```rust,no_run
//! use cs_db::{DbConfig, build_db_handle};
//!
//! # async fn demo() -> cs_db::Result<()> {
//! let cfg = DbConfig {
//!     dsn: "sqlite://./data/plants.db".to_owned(),
//!     ..DbConfig::default()
//! };
//! let db = build_db_handle(&cfg).await?;
//! let mut tx = db.begin().await?;
//! sqlx::query("SELECT 1").execute(&mut *tx).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod options;
pub mod sqlite;

pub use config::{DbConfig, PoolCfg};
pub use options::build_db_handle;

use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Open transaction on the pool; rolled back on drop unless committed.
pub type DbTransaction = sqlx::Transaction<'static, Sqlite>;

/// Typed error for the DB handle and helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unsupported DSN (expected a sqlite: URL): {0}")]
    UnknownDsn(String),

    #[error("Invalid SQLite PRAGMA parameter '{key}': {message}")]
    InvalidSqlitePragma { key: String, message: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Connection pool options; unset knobs keep the driver defaults.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool.
    pub max_conns: Option<u32>,
    /// Minimum number of connections in the pool.
    pub min_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Maximum lifetime for a connection.
    pub max_lifetime: Option<Duration>,
    /// Test connection health before acquire.
    pub test_before_acquire: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
            test_before_acquire: false,
        }
    }
}

/// Main handle.
#[derive(Debug, Clone)]
pub struct DbHandle {
    pool: SqlitePool,
    dsn: String,
    in_memory: bool,
}

impl DbHandle {
    /// Connect to `dsn` with default PRAGMAs.
    ///
    /// # Errors
    /// Returns an error if the DSN is not a `SQLite` URL or the connection fails.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        let cfg = DbConfig {
            dsn: dsn.to_owned(),
            ..DbConfig::default()
        };
        let options = options::sqlite_connect_options(&cfg)?;
        Self::connect_with(options, dsn, opts).await
    }

    /// Connect with fully built `SQLx` options.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be opened.
    pub async fn connect_with(
        options: SqliteConnectOptions,
        dsn: &str,
        opts: ConnectOpts,
    ) -> Result<Self> {
        let in_memory = sqlite::is_memory_dsn(dsn);
        let pool = pool_options(&opts, in_memory)
            .connect_with(options)
            .await?;
        tracing::debug!(dsn, in_memory, "SQLite pool opened");

        Ok(Self {
            pool,
            dsn: dsn.to_owned(),
            in_memory,
        })
    }

    /// Graceful pool close. (Dropping the pool also closes it; this just makes it explicit.)
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the DSN used for this connection.
    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.in_memory
    }

    /// Underlying `SQLx` pool, for single statements outside a transaction.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction.
    ///
    /// `SQLite` runs every transaction serializable; a transaction that
    /// performs no writes is read-only in effect and should be rolled back.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be started.
    pub async fn begin(&self) -> Result<DbTransaction> {
        Ok(self.pool.begin().await?)
    }
}

/// Pool builder for `opts`.
///
/// An in-memory database lives only as long as its connections, so its pool
/// is pinned to one connection that never expires; only the acquire timeout
/// and health check carry over.
fn pool_options(opts: &ConnectOpts, in_memory: bool) -> SqlitePoolOptions {
    let mut pool = SqlitePoolOptions::new().test_before_acquire(opts.test_before_acquire);
    if let Some(timeout) = opts.acquire_timeout {
        pool = pool.acquire_timeout(timeout);
    }

    if in_memory {
        return pool
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    }

    if let Some(max) = opts.max_conns {
        pool = pool.max_connections(max);
    }
    if let Some(min) = opts.min_conns {
        pool = pool.min_connections(min);
    }
    if opts.idle_timeout.is_some() {
        pool = pool.idle_timeout(opts.idle_timeout);
    }
    if opts.max_lifetime.is_some() {
        pool = pool.max_lifetime(opts.max_lifetime);
    }
    pool
}

// ===================== tests =====================

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_connection() -> Result<()> {
        let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
        assert!(db.is_memory());
        assert_eq!(db.dsn(), "sqlite::memory:");
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_database_survives_across_statements() -> Result<()> {
        let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
        sqlx::query("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(db.pool())
            .await?;
        sqlx::query("INSERT INTO test (name) VALUES (?)")
            .bind("test_value")
            .execute(db.pool())
            .await?;

        let row: (i64, String) = sqlx::query_as("SELECT id, name FROM test WHERE id = 1")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(row.0, 1);
        assert_eq!(row.1, "test_value");
        Ok(())
    }

    #[tokio::test]
    async fn test_non_sqlite_dsn_is_rejected() {
        let err = DbHandle::connect("postgres://localhost/test", ConnectOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownDsn(_)));
    }

    #[test]
    fn test_memory_pool_is_pinned_to_one_connection() {
        let opts = ConnectOpts {
            max_conns: Some(8),
            idle_timeout: Some(Duration::from_secs(60)),
            ..ConnectOpts::default()
        };

        let memory = pool_options(&opts, true);
        assert_eq!(memory.get_max_connections(), 1);
        assert_eq!(memory.get_min_connections(), 1);
        assert_eq!(memory.get_idle_timeout(), None);
        assert_eq!(memory.get_max_lifetime(), None);
        assert_eq!(memory.get_acquire_timeout(), Duration::from_secs(30));

        let file = pool_options(&opts, false);
        assert_eq!(file.get_max_connections(), 8);
        assert_eq!(file.get_idle_timeout(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_transaction() -> Result<()> {
        let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
        let tx = db.begin().await?;
        tx.commit().await?;
        Ok(())
    }
}
