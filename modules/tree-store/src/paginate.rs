//! List: a window over main-table rows.

use cs_schema::Mapping;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::denormalize::main_row;
use crate::error::{Operation, StoreError, StoreResult};
use crate::plan::QueryPlan;

/// Window over main rows ordered by `id`. `limit = 0` means no cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Main-table fields only; secondary tables are not read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Mapping>,
    /// Echo of the requested offset.
    pub offset: u64,
    pub count: usize,
}

pub async fn list_page(pool: &SqlitePool, plan: &QueryPlan, request: PageRequest) -> StoreResult<Page> {
    let main = plan.main();
    // SQLite reads a negative LIMIT as unbounded.
    let limit = if request.limit == 0 {
        -1
    } else {
        i64::try_from(request.limit).unwrap_or(i64::MAX)
    };
    let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);

    let rows = sqlx::query(plan.list_sql())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::query(Operation::List, &main.name, e))?;

    let items = rows
        .iter()
        .map(|row| main_row(main, row))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::query(Operation::List, &main.name, e))?;

    Ok(Page {
        count: items.len(),
        items,
        offset: request.offset,
    })
}
