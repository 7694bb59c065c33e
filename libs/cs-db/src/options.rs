//! Building connection options and handles from [`DbConfig`].

use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;

use crate::sqlite::{self, pragmas};
use crate::{ConnectOpts, DbConfig, DbError, DbHandle, Result};

/// Typed `SQLx` options for `cfg`.
///
/// File databases get their parent directory created (when
/// `create_if_missing` is set) and default to WAL journaling.
///
/// # Errors
/// Returns `DbError::UnknownDsn` for non-`SQLite` DSNs, `DbError::Sqlx` when
/// the DSN cannot be parsed, and `DbError::Io` when the directory cannot be
/// created.
pub fn sqlite_connect_options(cfg: &DbConfig) -> Result<SqliteConnectOptions> {
    let dsn = cfg.dsn.trim();
    if !sqlite::is_sqlite_dsn(dsn) {
        return Err(DbError::UnknownDsn(cfg.dsn.clone()));
    }

    let opts = SqliteConnectOptions::from_str(dsn)?
        .create_if_missing(cfg.create_if_missing)
        .foreign_keys(cfg.foreign_keys)
        .busy_timeout(cfg.busy_timeout);

    let in_memory = sqlite::is_memory_dsn(dsn);
    if !in_memory
        && cfg.create_if_missing
        && let Some(parent) = opts.get_filename().parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    Ok(pragmas::apply_pragmas(opts, cfg, in_memory))
}

/// Build a database handle from configuration.
///
/// # Errors
/// Returns an error if the configuration is invalid or the connection fails.
pub async fn build_db_handle(cfg: &DbConfig) -> Result<DbHandle> {
    let options = sqlite_connect_options(cfg)?;
    tracing::debug!(dsn = %cfg.dsn, "Building database connection");
    DbHandle::connect_with(options, &cfg.dsn, ConnectOpts::from(&cfg.pool)).await
}
