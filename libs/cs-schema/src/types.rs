//! Logical field type to store column type mapping.

use std::fmt;

use crate::error::CompileError;
use crate::model::{Field, FieldType};

/// Column type in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }

    /// Map a logical type; `None` for names outside the known set.
    ///
    /// Booleans are stored as 0/1 integers and datetimes as ISO-8601 text.
    #[must_use]
    pub fn for_type(ty: &FieldType) -> Option<Self> {
        match ty {
            FieldType::String | FieldType::Datetime => Some(ColumnType::Text),
            FieldType::Integer | FieldType::Boolean => Some(ColumnType::Integer),
            FieldType::Float => Some(ColumnType::Real),
            FieldType::Unknown(_) => None,
        }
    }

    /// Map the type of `field` declared in `table`.
    ///
    /// # Errors
    /// Returns `CompileError::UnknownType` when the field's logical type is unknown.
    pub fn for_field(table: &str, field: &Field) -> Result<Self, CompileError> {
        Self::for_type(&field.ty).ok_or_else(|| CompileError::UnknownType {
            table: table.to_owned(),
            field: field.name.clone(),
            type_name: field.ty.as_str().to_owned(),
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}
