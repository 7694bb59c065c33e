//! Get: rows of one object reassembled into its nested tree.

use cs_schema::{ID_COLUMN, Mapping, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::codec;
use crate::error::{Operation, StoreError, StoreResult};
use crate::plan::{QueryPlan, SecondaryKind, SecondaryPlan, TablePlan};

/// Read object `id`: one query per table, secondary rows in `id` order.
///
/// List tables come back as sequences of scalars, object tables as
/// sequences of mappings; no rows gives an empty sequence.
pub async fn get_tree(conn: &mut SqliteConnection, plan: &QueryPlan, id: i64) -> StoreResult<Mapping> {
    let main = plan.main();
    let row = sqlx::query(&main.select)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StoreError::query(Operation::Get, &main.name, e))?;
    let Some(row) = row else {
        return Err(StoreError::NotFound {
            table: main.name.clone(),
            id,
        });
    };
    let mut tree =
        main_row(main, &row).map_err(|e| StoreError::query(Operation::Get, &main.name, e))?;

    for SecondaryPlan { kind, table } in plan.secondary() {
        let rows = sqlx::query(&table.select)
            .bind(id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| StoreError::query(Operation::Get, &table.name, e))?;

        let items = match kind {
            SecondaryKind::List => {
                let column = table.value_column()?;
                rows.iter()
                    .map(|row| codec::decode(column.codec, row, 0))
                    .collect::<Result<Vec<_>, _>>()
            }
            SecondaryKind::Object => rows
                .iter()
                .map(|row| data_columns(table, row, 0).map(Value::Mapping))
                .collect::<Result<Vec<_>, _>>(),
        }
        .map_err(|e| StoreError::query(Operation::Get, &table.name, e))?;

        debug!(table = %table.name, rows = items.len(), "secondary rows read");
        tree.insert(table.name.clone(), Value::Sequence(items));
    }

    Ok(tree)
}

/// A main-table row selected as `id` followed by the data columns.
pub fn main_row(table: &TablePlan, row: &SqliteRow) -> Result<Mapping, sqlx::Error> {
    let mut out = Mapping::with_capacity(table.columns.len() + 1);
    out.insert(ID_COLUMN.to_owned(), Value::Integer(row.try_get::<i64, _>(0)?));
    out.extend(data_columns(table, row, 1)?);
    Ok(out)
}

fn data_columns(table: &TablePlan, row: &SqliteRow, offset: usize) -> Result<Mapping, sqlx::Error> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| -> Result<(String, Value), sqlx::Error> {
            Ok((col.name.clone(), codec::decode(col.codec, row, offset + i)?))
        })
        .collect()
}
