//! Schema compiler: one ordered list of table-definition statements per table.
//!
//! Compilation is a pure transform. It never touches the store and iterates
//! tables and fields in declaration order only, so compiling an equal schema
//! twice yields identical statements.

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::model::{ID_COLUMN, PARENT_ID_COLUMN, Schema, Table, TableKind};
use crate::types::ColumnType;

/// Table name to its DDL statements, in schema order.
pub type Ddl = IndexMap<String, Vec<String>>;

/// A compiled column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
    /// Table whose `id` this column refers to.
    pub references: Option<String>,
}

impl ColumnDef {
    fn data(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            column_type,
            primary_key: false,
            not_null: false,
            references: None,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("{} {}", quote_ident(&self.name), self.column_type);
        if self.primary_key {
            out.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if self.not_null {
            out.push_str(" NOT NULL");
        }
        if let Some(parent) = &self.references {
            out.push_str(" REFERENCES ");
            out.push_str(&quote_ident(parent));
            out.push_str(" (");
            out.push_str(&quote_ident(ID_COLUMN));
            out.push(')');
        }
        out
    }
}

/// Double-quote an identifier.
///
/// Only meant for names that passed [`Schema::validate`].
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// Compile every table of `schema`.
///
/// # Errors
/// Returns `CompileError::Schema` if the schema is structurally invalid and
/// `CompileError::UnknownType` if a field has an unmapped logical type.
pub fn compile(schema: &Schema) -> Result<Ddl, CompileError> {
    schema.validate()?;
    schema
        .tables
        .iter()
        .map(|(name, table)| -> Result<_, CompileError> {
            Ok((name.clone(), table_statements(schema, name, table)?))
        })
        .collect()
}

/// Compile a single table of `schema`.
///
/// # Errors
/// Same as [`compile`], plus `SchemaError::UnknownTable` for undeclared names.
pub fn compile_table(schema: &Schema, name: &str) -> Result<Vec<String>, CompileError> {
    schema.validate()?;
    let table = schema.table(name)?;
    table_statements(schema, name, table)
}

/// Typed columns of table `name`, synthetic keys first.
///
/// # Errors
/// Same as [`compile_table`].
pub fn compile_columns(schema: &Schema, name: &str) -> Result<Vec<ColumnDef>, CompileError> {
    schema.validate()?;
    let table = schema.table(name)?;
    columns(schema, name, table)
}

fn columns(schema: &Schema, name: &str, table: &Table) -> Result<Vec<ColumnDef>, CompileError> {
    let mut cols = vec![ColumnDef {
        name: ID_COLUMN.to_owned(),
        column_type: ColumnType::Integer,
        primary_key: true,
        not_null: false,
        references: None,
    }];

    if schema.kind_of(name, table) != TableKind::Main {
        cols.push(ColumnDef {
            name: PARENT_ID_COLUMN.to_owned(),
            column_type: ColumnType::Integer,
            primary_key: false,
            not_null: true,
            references: Some(schema.main_table.clone()),
        });
    }

    for field in table.data_fields() {
        cols.push(ColumnDef::data(
            &field.name,
            ColumnType::for_field(name, field)?,
        ));
    }
    Ok(cols)
}

fn table_statements(
    schema: &Schema,
    name: &str,
    table: &Table,
) -> Result<Vec<String>, CompileError> {
    let cols = columns(schema, name, table)?;
    let body = cols
        .iter()
        .map(ColumnDef::render)
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmts = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({body})",
        quote_ident(name)
    )];

    if schema.kind_of(name, table) != TableKind::Main {
        stmts.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&format!("{name}_{PARENT_ID_COLUMN}_idx")),
            quote_ident(name),
            quote_ident(PARENT_ID_COLUMN),
        ));
    }

    Ok(stmts)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::model::Field;

    fn plant_schema() -> Schema {
        let mut tables = IndexMap::new();
        tables.insert(
            "plant".to_owned(),
            Table::object(vec![Field::new("name", "string"), Field::new("height", "float")]),
        );
        tables.insert("tags".to_owned(), Table::list(Field::new("value", "string")));
        tables.insert(
            "origin".to_owned(),
            Table::object(vec![
                Field::new("country", "string"),
                Field::new("region", "string"),
            ]),
        );
        Schema::new("plant", tables)
    }

    #[test]
    fn one_definition_per_table() {
        let ddl = compile(&plant_schema()).unwrap();
        let names: Vec<&str> = ddl.keys().map(String::as_str).collect();
        assert_eq!(names, ["plant", "tags", "origin"]);
    }

    #[test]
    fn main_table_has_id_and_declared_fields() {
        let ddl = compile(&plant_schema()).unwrap();
        assert_eq!(
            ddl["plant"],
            [r#"CREATE TABLE IF NOT EXISTS "plant" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "name" TEXT, "height" REAL)"#]
        );
    }

    #[test]
    fn secondary_tables_get_parent_id_and_index() {
        let ddl = compile(&plant_schema()).unwrap();
        assert_eq!(
            ddl["tags"],
            [
                r#"CREATE TABLE IF NOT EXISTS "tags" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "parent_id" INTEGER NOT NULL REFERENCES "plant" ("id"), "value" TEXT)"#,
                r#"CREATE INDEX IF NOT EXISTS "tags_parent_id_idx" ON "tags" ("parent_id")"#,
            ]
        );

        let cols = compile_columns(&plant_schema(), "origin").unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "parent_id", "country", "region"]);
        assert_eq!(cols[1].column_type, ColumnType::Integer);
        assert!(cols[1].not_null);
    }

    #[test]
    fn compilation_is_deterministic() {
        let first = compile(&plant_schema()).unwrap();
        let second = compile(&plant_schema()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn boolean_and_datetime_columns() {
        let mut schema = plant_schema();
        schema.tables["plant"]
            .fields
            .push(Field::new("indoor", "boolean"));
        schema.tables["plant"]
            .fields
            .push(Field::new("planted_at", "datetime"));
        let cols = compile_columns(&schema, "plant").unwrap();
        assert_eq!(cols[3].column_type, ColumnType::Integer);
        assert_eq!(cols[4].column_type, ColumnType::Text);
    }

    #[test]
    fn missing_main_table_fails_compile() {
        let mut schema = plant_schema();
        schema.main_table = "tree".to_owned();
        assert_eq!(
            compile(&schema),
            Err(CompileError::Schema(SchemaError::MissingMainTable {
                main_table: "tree".to_owned()
            }))
        );
    }

    #[test]
    fn unknown_type_fails_compile() {
        let mut schema = plant_schema();
        schema.tables["origin"].fields.push(Field::new("shape", "polygon"));
        assert!(matches!(
            compile(&schema),
            Err(CompileError::UnknownType { table, field, .. }) if table == "origin" && field == "shape"
        ));
    }

    #[test]
    fn unknown_table_is_reported() {
        assert!(matches!(
            compile_table(&plant_schema(), "leaves"),
            Err(CompileError::Schema(SchemaError::UnknownTable { .. }))
        ));
    }
}
