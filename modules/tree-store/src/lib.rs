#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tree store: schema-shaped object trees kept in normalized `SQLite` tables.
//!
//! An object is written as one main-table row plus one row per list element
//! and per nested mapping in the secondary tables, all in one transaction,
//! and read back into the same nested shape.
//!
//! ```rust,no_run
//! use cs_db::{ConnectOpts, DbHandle};
//! use cs_schema::{Schema, Value};
//! use tree_store::{PageRequest, TreeStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::from_yaml_str(
//!     "main_table: plant
//! tables:
//!   plant: { fields: [ { name: name, type: string } ] }
//!   tags: { is_list: true, value_field: { name: value, type: string } }
//! ",
//! )?;
//! let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
//! let store = TreeStore::new(db, schema)?;
//! store.provision().await?;
//!
//! let tree: Value = serde_json::from_str(r#"{"name": "Fern", "tags": ["green"]}"#)?;
//! let id = store.insert(&tree).await?;
//! let back = store.get(id).await?;
//! let page = store.list(PageRequest::new(0, 10)).await?;
//! # let _ = (back, page);
//! # Ok(())
//! # }
//! ```

mod codec;
mod denormalize;
pub mod error;
mod layout;
mod normalize;
mod paginate;
mod plan;
mod service;

pub use codec::Codec;
pub use error::{Operation, QueryFailure, StoreError, StoreResult};
pub use layout::ColumnInfo;
pub use paginate::{Page, PageRequest};
pub use plan::{PlannedColumn, QueryPlan, SecondaryKind, SecondaryPlan, TablePlan};
pub use service::TreeStore;
