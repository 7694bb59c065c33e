//! `SQLite` helpers: DSN inspection and typed PRAGMAs.

pub mod pragmas;

/// Whether `dsn` names an in-memory database.
#[must_use]
pub fn is_memory_dsn(dsn: &str) -> bool {
    let dsn = dsn.trim();
    dsn == "sqlite::memory:"
        || dsn.ends_with(":memory:")
        || dsn.contains("mode=memory")
}

/// Whether `dsn` uses the `sqlite:` scheme.
#[must_use]
pub fn is_sqlite_dsn(dsn: &str) -> bool {
    dsn.trim_start().starts_with("sqlite:")
}
