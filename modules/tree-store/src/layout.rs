//! Provisioning of the compiled tables and verification of an existing layout.

use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{Operation, StoreError, StoreResult};
use crate::plan::{QueryPlan, TablePlan};

const TABLE_INFO: &str =
    r#"SELECT "name", "type", "notnull", "pk" FROM pragma_table_info(?) ORDER BY "cid""#;

/// Column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Run every table definition, in schema order.
pub async fn provision(conn: &mut SqliteConnection, plan: &QueryPlan) -> StoreResult<()> {
    for (table, statements) in plan.ddl() {
        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| StoreError::query(Operation::Provision, table, e))?;
        }
        debug!(table = %table, statements = statements.len(), "table provisioned");
    }
    Ok(())
}

/// Check that every planned table exists with the planned columns.
pub async fn verify(pool: &SqlitePool, plan: &QueryPlan) -> StoreResult<()> {
    for table in plan.tables() {
        let rows = sqlx::query(TABLE_INFO)
            .bind(table.name.as_str())
            .fetch_all(pool)
            .await
            .map_err(|e| StoreError::query(Operation::Verify, &table.name, e))?;

        let actual = rows
            .iter()
            .map(|row| -> Result<ColumnInfo, sqlx::Error> {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    declared_type: row.try_get(1)?,
                    not_null: row.try_get::<i64, _>(2)? != 0,
                    primary_key: row.try_get::<i64, _>(3)? != 0,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::query(Operation::Verify, &table.name, e))?;

        check_table(table, &actual)?;
        debug!(table = %table.name, columns = actual.len(), "layout verified");
    }
    Ok(())
}

/// Compare the planned layout of `table` with what the store reports.
///
/// Extra columns are tolerated.
pub fn check_table(table: &TablePlan, actual: &[ColumnInfo]) -> StoreResult<()> {
    if actual.is_empty() {
        return Err(StoreError::mismatch(&table.name, "table does not exist"));
    }

    for expected in &table.layout {
        let Some(found) = actual.iter().find(|c| c.name == expected.name) else {
            return Err(StoreError::mismatch(
                &table.name,
                format!("missing column '{}'", expected.name),
            ));
        };
        let expected_type = expected.column_type.as_sql();
        if !found.declared_type.eq_ignore_ascii_case(expected_type) {
            return Err(StoreError::mismatch(
                &table.name,
                format!(
                    "column '{}' has type {}, expected {expected_type}",
                    expected.name, found.declared_type
                ),
            ));
        }
        if expected.primary_key && !found.primary_key {
            return Err(StoreError::mismatch(
                &table.name,
                format!("column '{}' is not the primary key", expected.name),
            ));
        }
        if expected.not_null && !found.not_null {
            return Err(StoreError::mismatch(
                &table.name,
                format!("column '{}' accepts NULL", expected.name),
            ));
        }
    }

    for extra in actual
        .iter()
        .filter(|c| !table.layout.iter().any(|e| e.name == c.name))
    {
        debug!(table = %table.name, column = %extra.name, "column not in schema");
    }
    Ok(())
}
