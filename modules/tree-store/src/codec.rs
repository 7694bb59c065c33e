//! Conversion between tree values and column values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use cs_schema::{ColumnType, CompileError, Field, FieldType, Value};
use sqlx::Row;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};

use crate::error::QueryFailure;

pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Storage class a declared field is read and written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Text,
    Datetime,
    Integer,
    Real,
    Boolean,
}

impl Codec {
    /// # Errors
    /// Returns `CompileError::UnknownType` for unmapped logical types.
    pub fn for_field(table: &str, field: &Field) -> Result<Self, CompileError> {
        // Fails the same way the compiler does for unknown types.
        ColumnType::for_field(table, field)?;
        Ok(match field.ty {
            FieldType::Datetime => Codec::Datetime,
            FieldType::Integer => Codec::Integer,
            FieldType::Float => Codec::Real,
            FieldType::Boolean => Codec::Boolean,
            FieldType::String | FieldType::Unknown(_) => Codec::Text,
        })
    }

    fn field_type(self) -> FieldType {
        match self {
            Codec::Text => FieldType::String,
            Codec::Datetime => FieldType::Datetime,
            Codec::Integer => FieldType::Integer,
            Codec::Real => FieldType::Float,
            Codec::Boolean => FieldType::Boolean,
        }
    }
}

/// A value ready to be bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Check `value` against the column's declared type.
///
/// Integers are accepted for float columns; REAL affinity stores them as
/// floating point.
pub fn encode(codec: Codec, column: &str, value: &Value) -> Result<SqlArg, QueryFailure> {
    let arg = match (codec, value) {
        (_, Value::Null) => SqlArg::Null,
        (Codec::Text, Value::String(s)) => SqlArg::Text(s.clone()),
        (Codec::Datetime, Value::String(s)) if is_datetime(s) => SqlArg::Text(s.clone()),
        (Codec::Integer | Codec::Real, Value::Integer(i)) => SqlArg::Integer(*i),
        (Codec::Real, Value::Float(f)) => SqlArg::Real(*f),
        (Codec::Boolean, Value::Bool(b)) => SqlArg::Integer(i64::from(*b)),
        (Codec::Datetime, Value::String(s)) => {
            return Err(QueryFailure::TypeMismatch {
                column: column.to_owned(),
                expected: codec.field_type(),
                found: format!("unparseable datetime '{s}'"),
            });
        }
        _ => {
            return Err(QueryFailure::TypeMismatch {
                column: column.to_owned(),
                expected: codec.field_type(),
                found: value.kind().to_owned(),
            });
        }
    };
    Ok(arg)
}

pub fn bind_arg(query: SqliteQuery<'_>, arg: SqlArg) -> SqliteQuery<'_> {
    match arg {
        SqlArg::Null => query.bind(None::<String>),
        SqlArg::Integer(i) => query.bind(i),
        SqlArg::Real(f) => query.bind(f),
        SqlArg::Text(s) => query.bind(s),
    }
}

/// Read column `idx` of `row` back into a tree value.
pub fn decode(codec: Codec, row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let value = match codec {
        Codec::Text | Codec::Datetime => row.try_get::<Option<String>, _>(idx)?.map(Value::String),
        Codec::Integer => row.try_get::<Option<i64>, _>(idx)?.map(Value::Integer),
        Codec::Real => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
        Codec::Boolean => row
            .try_get::<Option<i64>, _>(idx)?
            .map(|v| Value::Bool(v != 0)),
    };
    Ok(value.unwrap_or_default())
}

/// RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]` or a bare date.
fn is_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn scalars_encode_by_declared_type() {
        assert_eq!(
            encode(Codec::Text, "name", &Value::from("Fern")).unwrap(),
            SqlArg::Text("Fern".to_owned())
        );
        assert_eq!(
            encode(Codec::Real, "height", &Value::from(2_i64)).unwrap(),
            SqlArg::Integer(2)
        );
        assert_eq!(
            encode(Codec::Boolean, "indoor", &Value::from(true)).unwrap(),
            SqlArg::Integer(1)
        );
        assert_eq!(
            encode(Codec::Integer, "age", &Value::Null).unwrap(),
            SqlArg::Null
        );
    }

    #[test]
    fn datetime_formats() {
        for s in ["2024-03-01T10:00:00Z", "2024-03-01T10:00:00.250", "2024-03-01"] {
            assert!(encode(Codec::Datetime, "planted_at", &Value::from(s)).is_ok(), "{s}");
        }
        let err = encode(Codec::Datetime, "planted_at", &Value::from("last spring")).unwrap_err();
        assert!(err.to_string().contains("unparseable datetime"));
    }

    #[test]
    fn mismatches_name_the_column() {
        let err = encode(Codec::Text, "value", &Value::from(5_i64)).unwrap_err();
        assert_eq!(err.to_string(), "column 'value' expects string, got integer");

        let err = encode(Codec::Integer, "age", &Value::from(1.5)).unwrap_err();
        assert!(matches!(err, QueryFailure::TypeMismatch { found, .. } if found == "float"));

        let nested = Value::Sequence(vec![Value::from("a")]);
        assert!(encode(Codec::Text, "name", &nested).is_err());
    }

    #[test]
    fn unknown_type_has_no_codec() {
        assert!(Codec::for_field("plant", &Field::new("blob", "bytes")).is_err());
        assert_eq!(
            Codec::for_field("plant", &Field::new("indoor", "bool")).unwrap(),
            Codec::Boolean
        );
    }
}
