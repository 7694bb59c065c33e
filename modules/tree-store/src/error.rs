use std::fmt;

use cs_db::DbError;
use cs_schema::{CompileError, FieldType, SchemaError};
use thiserror::Error;

/// Store operation, recorded on query errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Provision,
    Verify,
    Insert,
    Get,
    List,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Provision => "provision",
            Operation::Verify => "verify",
            Operation::Insert => "insert",
            Operation::Get => "get",
            Operation::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a statement against a table failed.
#[derive(Debug, Error)]
pub enum QueryFailure {
    #[error(transparent)]
    Driver(#[from] sqlx::Error),

    #[error("column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        found: String,
    },

    #[error("expected {expected}, got {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{op} failed on table '{table}'")]
    Query {
        op: Operation,
        table: String,
        #[source]
        source: QueryFailure,
    },

    #[error("no row with id {id} in table '{table}'")]
    NotFound { table: String, id: i64 },

    #[error("table '{table}' does not match the schema: {detail}")]
    LayoutMismatch { table: String, detail: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl StoreError {
    pub(crate) fn query(op: Operation, table: &str, source: impl Into<QueryFailure>) -> Self {
        StoreError::Query {
            op,
            table: table.to_owned(),
            source: source.into(),
        }
    }

    pub(crate) fn mismatch(table: &str, detail: impl Into<String>) -> Self {
        StoreError::LayoutMismatch {
            table: table.to_owned(),
            detail: detail.into(),
        }
    }

    /// Underlying driver error, if the failure came from the store itself.
    #[must_use]
    pub fn driver_error(&self) -> Option<&sqlx::Error> {
        match self {
            StoreError::Query {
                source: QueryFailure::Driver(e),
                ..
            }
            | StoreError::Db(DbError::Sqlx(e)) => Some(e),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
