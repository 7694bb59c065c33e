#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Common Sense schema crate.
//!
//! Declares the shape of a hierarchical object (a main table holding the
//! top-level scalar fields plus secondary tables for repeated scalars and
//! nested field sets) and compiles it into a normalized relational layout.
//!
//! # Example
//! ```rust
//! use cs_schema::{Schema, compile};
//!
//! let schema = Schema::from_yaml_str(r#"
//! main_table: plant
//! tables:
//!   plant:
//!     fields:
//!       - { name: name, type: string }
//!   tags:
//!     is_list: true
//!     value_field: { name: value, type: string }
//! "#).unwrap();
//!
//! let ddl = compile(&schema).unwrap();
//! assert_eq!(ddl.len(), 2);
//! ```

pub mod compiler;
pub mod error;
pub mod model;
pub mod types;
pub mod value;

pub use compiler::{ColumnDef, Ddl, compile, compile_columns, compile_table, quote_ident};
pub use error::{CompileError, SchemaError};
pub use model::{Field, FieldType, ID_COLUMN, PARENT_ID_COLUMN, Schema, Table, TableKind};
pub use types::ColumnType;
pub use value::{Mapping, Value};
