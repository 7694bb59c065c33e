//! Database configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConnectOpts;
use crate::sqlite::pragmas::{JournalMode, Synchronous};

/// Default DSN: a private in-memory database.
pub const DEFAULT_DSN: &str = "sqlite::memory:";

/// How long a writer waits on a locked database file before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database section of the application config.
///
/// ```yaml
/// database:
///   dsn: "sqlite://./data/plants.db"
///   busy_timeout: 5s
///   journal_mode: wal
///   synchronous: normal
///   pool:
///     max_conns: 4
///     acquire_timeout: 30s
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub dsn: String,
    /// Create the database file on first connect.
    pub create_if_missing: bool,
    /// Enforce `parent_id` references.
    pub foreign_keys: bool,
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    /// Defaults to WAL for database files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_mode: Option<JournalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronous: Option<Synchronous>,
    pub pool: PoolCfg,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: DEFAULT_DSN.to_owned(),
            create_if_missing: true,
            foreign_keys: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: None,
            synchronous: None,
            pool: PoolCfg::default(),
        }
    }
}

/// Pool knobs; unset values keep the driver defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolCfg {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Option<Duration>,
    pub test_before_acquire: bool,
}

impl From<&PoolCfg> for ConnectOpts {
    fn from(cfg: &PoolCfg) -> Self {
        let defaults = ConnectOpts::default();
        Self {
            max_conns: cfg.max_conns.or(defaults.max_conns),
            min_conns: cfg.min_conns,
            acquire_timeout: cfg.acquire_timeout.or(defaults.acquire_timeout),
            idle_timeout: cfg.idle_timeout,
            max_lifetime: cfg.max_lifetime,
            test_before_acquire: cfg.test_before_acquire,
        }
    }
}
