use std::sync::Arc;

use cs_db::{DbHandle, DbTransaction};
use cs_schema::{Mapping, Schema, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Operation, StoreError, StoreResult};
use crate::paginate::{Page, PageRequest};
use crate::plan::QueryPlan;
use crate::{denormalize, layout, normalize};

/// Object-tree storage for one schema over one database.
///
/// Every operation runs to completion inside its own transaction (or a
/// single statement for `list`); nothing is held open between calls.
/// `SQLite` serializes writers per database, so concurrent inserts behave as
/// if run one after another.
#[derive(Debug, Clone)]
pub struct TreeStore {
    db: DbHandle,
    schema: Arc<Schema>,
    plan: Arc<QueryPlan>,
}

impl TreeStore {
    /// Validate and compile `schema` and prepare every statement.
    ///
    /// # Errors
    /// Returns `StoreError::Schema` or `StoreError::Compile` for schemas that
    /// do not compile. The database is not touched.
    pub fn new(db: DbHandle, schema: Schema) -> StoreResult<Self> {
        schema.validate()?;
        let plan = QueryPlan::build(&schema)?;
        debug!(
            main_table = %schema.main_table,
            tables = schema.tables.len(),
            "query plan built"
        );
        Ok(Self {
            db,
            schema: Arc::new(schema),
            plan: Arc::new(plan),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    #[must_use]
    pub fn db(&self) -> &DbHandle {
        &self.db
    }

    /// Close the underlying pool.
    pub async fn close(self) {
        self.db.close().await;
    }

    /// Create every table and index of the schema in one transaction.
    /// Existing tables are left as they are.
    ///
    /// # Errors
    /// Returns `StoreError::Query` naming the table whose definition failed.
    #[instrument(skip(self), fields(main_table = %self.schema.main_table))]
    pub async fn provision(&self) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let result = layout::provision(&mut tx, &self.plan).await;
        finish(tx, result, Operation::Provision, &self.plan.main().name).await?;
        info!(tables = self.plan.ddl().len(), "tables provisioned");
        Ok(())
    }

    /// Check that the database holds the tables and columns of the schema.
    ///
    /// # Errors
    /// Returns `StoreError::LayoutMismatch` for the first table that differs.
    #[instrument(skip(self), fields(main_table = %self.schema.main_table))]
    pub async fn verify(&self) -> StoreResult<()> {
        layout::verify(self.db.pool(), &self.plan).await?;
        info!("layout verified");
        Ok(())
    }

    /// Store `tree` as one main row plus its secondary rows; returns the new id.
    ///
    /// All rows are written or none are.
    ///
    /// # Errors
    /// Returns `StoreError::Query` naming the failing table for shape and type
    /// mismatches and for store failures.
    #[instrument(skip(self, tree), fields(main_table = %self.schema.main_table))]
    pub async fn insert(&self, tree: &Value) -> StoreResult<i64> {
        let root = normalize::root_mapping(&self.plan, tree)?;
        let mut tx = self.db.begin().await?;
        let result = normalize::insert_tree(&mut tx, &self.plan, root).await;
        let id = finish(tx, result, Operation::Insert, &self.plan.main().name).await?;
        info!(id, "object inserted");
        Ok(id)
    }

    /// Reassemble object `id`. Reads run in a transaction that is always
    /// rolled back.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` when no main row has this id.
    #[instrument(skip(self), fields(main_table = %self.schema.main_table))]
    pub async fn get(&self, id: i64) -> StoreResult<Mapping> {
        let mut tx = self.db.begin().await?;
        let result = denormalize::get_tree(&mut tx, &self.plan, id).await;
        rollback(tx, Operation::Get).await;
        let tree = result?;
        debug!(id, "object read");
        Ok(tree)
    }

    /// Main-table rows ordered by `id`.
    ///
    /// # Errors
    /// Returns `StoreError::Query` for store failures.
    #[instrument(skip(self), fields(main_table = %self.schema.main_table))]
    pub async fn list(&self, request: PageRequest) -> StoreResult<Page> {
        let page = crate::paginate::list_page(self.db.pool(), &self.plan, request).await?;
        debug!(count = page.count, "page listed");
        Ok(page)
    }
}

/// Commit on success; on failure roll back and return the original error.
async fn finish<T>(
    tx: DbTransaction,
    result: StoreResult<T>,
    op: Operation,
    table: &str,
) -> StoreResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| StoreError::query(op, table, e))?;
            Ok(value)
        }
        Err(err) => {
            rollback(tx, op).await;
            Err(err)
        }
    }
}

async fn rollback(tx: DbTransaction, op: Operation) {
    if let Err(e) = tx.rollback().await {
        warn!(%op, error = %e, "transaction rollback failed");
    }
}
