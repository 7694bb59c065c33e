//! Insert: one object tree into rows across the main and secondary tables.

use cs_schema::{Mapping, Value};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::codec::{self, SqlArg};
use crate::error::{Operation, QueryFailure, StoreError, StoreResult};
use crate::plan::{QueryPlan, SecondaryKind, SecondaryPlan, TablePlan};

/// The root of an insert tree must be a mapping.
pub fn root_mapping<'a>(plan: &QueryPlan, tree: &'a Value) -> StoreResult<&'a Mapping> {
    tree.as_mapping()
        .ok_or_else(|| shape(plan.main(), "mapping", tree))
}

/// Write `root` and all of its secondary rows; returns the new main id.
///
/// Runs on a connection inside an open transaction; the caller commits or
/// rolls back.
pub async fn insert_tree(
    conn: &mut SqliteConnection,
    plan: &QueryPlan,
    root: &Mapping,
) -> StoreResult<i64> {
    let main = plan.main();
    let nested: Vec<&str> = plan
        .secondary()
        .iter()
        .map(|s| s.table.name.as_str())
        .collect();
    log_dropped_keys(main, root, &nested);

    let id = insert_row(conn, main, None, root).await?;
    debug!(table = %main.name, id, "main row inserted");

    for SecondaryPlan { kind, table } in plan.secondary() {
        let items = elements(*kind, table, root.get(&table.name))?;
        match kind {
            SecondaryKind::List => {
                let column = table.value_column()?;
                for item in items {
                    let arg = codec::encode(column.codec, &column.name, item)
                        .map_err(|e| StoreError::query(Operation::Insert, &table.name, e))?;
                    execute_insert(conn, table, Some(id), vec![arg]).await?;
                }
            }
            SecondaryKind::Object => {
                for item in items {
                    let element = item
                        .as_mapping()
                        .ok_or_else(|| shape(table, "mapping", item))?;
                    log_dropped_keys(table, element, &[]);
                    insert_row(conn, table, Some(id), element).await?;
                }
            }
        }
        debug!(table = %table.name, rows = items.len(), "secondary rows inserted");
    }

    Ok(id)
}

/// Elements stored for `table`; absent or null means none.
///
/// A single mapping counts as one element of an object table.
fn elements<'a>(
    kind: SecondaryKind,
    table: &TablePlan,
    value: Option<&'a Value>,
) -> StoreResult<&'a [Value]> {
    match (kind, value) {
        (_, None | Some(Value::Null)) => Ok(&[]),
        (_, Some(Value::Sequence(items))) => Ok(items),
        (SecondaryKind::Object, Some(single @ Value::Mapping(_))) => {
            Ok(std::slice::from_ref(single))
        }
        (SecondaryKind::List, Some(other)) => Err(shape(table, "sequence", other)),
        (SecondaryKind::Object, Some(other)) => {
            Err(shape(table, "sequence of mappings", other))
        }
    }
}

async fn insert_row(
    conn: &mut SqliteConnection,
    table: &TablePlan,
    parent_id: Option<i64>,
    source: &Mapping,
) -> StoreResult<i64> {
    let args = table
        .columns
        .iter()
        .map(|col| codec::encode(col.codec, &col.name, source.get(&col.name).unwrap_or(&Value::Null)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::query(Operation::Insert, &table.name, e))?;
    execute_insert(conn, table, parent_id, args).await
}

async fn execute_insert(
    conn: &mut SqliteConnection,
    table: &TablePlan,
    parent_id: Option<i64>,
    args: Vec<SqlArg>,
) -> StoreResult<i64> {
    let mut query = sqlx::query(&table.insert);
    if let Some(parent_id) = parent_id {
        query = query.bind(parent_id);
    }
    for arg in args {
        query = codec::bind_arg(query, arg);
    }
    let done = query
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::query(Operation::Insert, &table.name, e))?;
    Ok(done.last_insert_rowid())
}

fn log_dropped_keys(table: &TablePlan, mapping: &Mapping, nested: &[&str]) {
    for key in mapping.keys() {
        let declared = table.columns.iter().any(|c| c.name == *key) || nested.contains(&key.as_str());
        if !declared {
            debug!(table = %table.name, key = %key, "dropping undeclared key");
        }
    }
}

fn shape(table: &TablePlan, expected: &'static str, found: &Value) -> StoreError {
    StoreError::query(
        Operation::Insert,
        &table.name,
        QueryFailure::Shape {
            expected,
            found: found.kind(),
        },
    )
}
