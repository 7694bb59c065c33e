//! Error types for schema validation and compilation.

use thiserror::Error;

/// Structural problems in the schema model itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("main table '{main_table}' is not declared in tables")]
    MissingMainTable { main_table: String },

    #[error("table '{table}' is not declared in the schema")]
    UnknownTable { table: String },

    #[error("list table '{table}' has no value_field")]
    MissingValueField { table: String },

    #[error("list table '{table}' must not declare fields besides its value_field")]
    ListTableWithFields { table: String },

    #[error("main table '{table}' cannot be a list table")]
    MainTableIsList { table: String },

    #[error("table '{table}' clashes with table '{existing}'; SQLite names ignore case")]
    DuplicateTable { table: String, existing: String },

    #[error("table name '{table}' uses the reserved 'sqlite_' prefix")]
    ReservedTableName { table: String },

    #[error("duplicate field '{field}' in table '{table}'")]
    DuplicateField { table: String, field: String },

    #[error("field '{field}' in table '{table}' uses a reserved column name")]
    ReservedField { table: String, field: String },

    #[error("invalid identifier '{name}' in table '{table}': only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier { table: String, name: String },

    #[error("secondary table '{table}' collides with a field of main table '{main_table}'")]
    NameCollision { table: String, main_table: String },

    #[error("failed to parse {format} schema: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Failures while translating a schema into table definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unknown logical type '{type_name}' for field '{table}.{field}'")]
    UnknownType {
        table: String,
        field: String,
        type_name: String,
    },
}
