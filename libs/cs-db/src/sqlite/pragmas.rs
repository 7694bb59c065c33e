//! Typed journaling and sync PRAGMAs settable from config.
//!
//! Values are read case-insensitively (`wal`, `WAL`) and written back in the
//! upper-case spelling `SQLite` reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

use crate::{DbConfig, DbError};

/// `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    const NAMES: &'static str = "DELETE/TRUNCATE/PERSIST/MEMORY/WAL/OFF";

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

impl FromStr for JournalMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "DELETE" => JournalMode::Delete,
            "TRUNCATE" => JournalMode::Truncate,
            "PERSIST" => JournalMode::Persist,
            "MEMORY" => JournalMode::Memory,
            "WAL" => JournalMode::Wal,
            "OFF" => JournalMode::Off,
            _ => return Err(invalid("journal_mode", Self::NAMES, s)),
        })
    }
}

impl From<JournalMode> for SqliteJournalMode {
    fn from(mode: JournalMode) -> Self {
        match mode {
            JournalMode::Delete => SqliteJournalMode::Delete,
            JournalMode::Truncate => SqliteJournalMode::Truncate,
            JournalMode::Persist => SqliteJournalMode::Persist,
            JournalMode::Memory => SqliteJournalMode::Memory,
            JournalMode::Wal => SqliteJournalMode::Wal,
            JournalMode::Off => SqliteJournalMode::Off,
        }
    }
}

/// `PRAGMA synchronous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Synchronous {
    Off,
    Normal,
    Full,
    Extra,
}

impl Synchronous {
    const NAMES: &'static str = "OFF/NORMAL/FULL/EXTRA";

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Synchronous::Off => "OFF",
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
            Synchronous::Extra => "EXTRA",
        }
    }
}

impl FromStr for Synchronous {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "OFF" => Synchronous::Off,
            "NORMAL" => Synchronous::Normal,
            "FULL" => Synchronous::Full,
            "EXTRA" => Synchronous::Extra,
            _ => return Err(invalid("synchronous", Self::NAMES, s)),
        })
    }
}

impl From<Synchronous> for SqliteSynchronous {
    fn from(sync: Synchronous) -> Self {
        match sync {
            Synchronous::Off => SqliteSynchronous::Off,
            Synchronous::Normal => SqliteSynchronous::Normal,
            Synchronous::Full => SqliteSynchronous::Full,
            Synchronous::Extra => SqliteSynchronous::Extra,
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = DbError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> Self {
                v.as_str().to_owned()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

string_conversions!(JournalMode, Synchronous);

fn invalid(key: &str, allowed: &str, got: &str) -> DbError {
    DbError::InvalidSqlitePragma {
        key: key.to_owned(),
        message: format!("must be one of {allowed}, got '{got}'"),
    }
}

/// Journal mode for `cfg`: the configured one, else WAL for database files.
/// In-memory databases keep `SQLite`'s own default.
#[must_use]
pub fn effective_journal_mode(cfg: &DbConfig, in_memory: bool) -> Option<JournalMode> {
    cfg.journal_mode
        .or((!in_memory).then_some(JournalMode::Wal))
}

/// Set the journaling and sync PRAGMAs chosen in `cfg`.
#[must_use]
pub fn apply_pragmas(
    mut opts: SqliteConnectOptions,
    cfg: &DbConfig,
    in_memory: bool,
) -> SqliteConnectOptions {
    if let Some(mode) = effective_journal_mode(cfg, in_memory) {
        opts = opts.journal_mode(mode.into());
    }
    if let Some(sync) = cfg.synchronous {
        opts = opts.synchronous(sync.into());
    }
    opts
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn names_parse_in_any_case() {
        assert_eq!("wal".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert_eq!("Truncate".parse::<JournalMode>().unwrap(), JournalMode::Truncate);
        assert_eq!("normal".parse::<Synchronous>().unwrap(), Synchronous::Normal);
        assert_eq!(Synchronous::Extra.to_string(), "EXTRA");
    }

    #[test]
    fn unknown_names_are_rejected_with_the_key() {
        let err = "fast".parse::<JournalMode>().unwrap_err();
        assert!(matches!(&err, DbError::InvalidSqlitePragma { key, .. } if key == "journal_mode"));
        assert!(err.to_string().contains("WAL"));

        let err = "sometimes".parse::<Synchronous>().unwrap_err();
        assert!(matches!(err, DbError::InvalidSqlitePragma { key, .. } if key == "synchronous"));
    }

    #[test]
    fn files_default_to_wal_and_config_wins() {
        let cfg = DbConfig::default();
        assert_eq!(effective_journal_mode(&cfg, false), Some(JournalMode::Wal));
        assert_eq!(effective_journal_mode(&cfg, true), None);

        let cfg = DbConfig {
            journal_mode: Some(JournalMode::Delete),
            ..DbConfig::default()
        };
        assert_eq!(effective_journal_mode(&cfg, false), Some(JournalMode::Delete));
        assert_eq!(effective_journal_mode(&cfg, true), Some(JournalMode::Delete));
    }
}
