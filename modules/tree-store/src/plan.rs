//! Statements for one schema, built once when the store is opened.

use cs_schema::{
    ColumnDef, Ddl, ID_COLUMN, PARENT_ID_COLUMN, Schema, SchemaError, TableKind, compile,
    compile_columns, quote_ident,
};

use crate::codec::Codec;
use crate::error::StoreResult;

/// A data column and how its values are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub name: String,
    pub codec: Codec,
}

#[derive(Debug, Clone)]
pub struct TablePlan {
    pub name: String,
    /// Data columns in declaration order; excludes `id` and `parent_id`.
    pub columns: Vec<PlannedColumn>,
    /// Full typed layout, synthetic keys first.
    pub layout: Vec<ColumnDef>,
    /// Inserts one row. Secondary tables bind `parent_id` first.
    pub insert: String,
    /// Main table: the row with `id = ?`, `id` first.
    /// Secondary tables: rows with `parent_id = ?` ordered by `id`.
    pub select: String,
}

impl TablePlan {
    /// Element column of a list table.
    ///
    /// # Errors
    /// Returns `SchemaError::MissingValueField` when the table has no data column.
    pub fn value_column(&self) -> Result<&PlannedColumn, SchemaError> {
        self.columns
            .first()
            .ok_or_else(|| SchemaError::MissingValueField {
                table: self.name.clone(),
            })
    }

    fn build(schema: &Schema, name: &str) -> StoreResult<Self> {
        let table = schema.table(name)?;
        let kind = schema.kind_of(name, table);
        let layout = compile_columns(schema, name)?;

        let columns = table
            .data_fields()
            .iter()
            .map(|field| -> StoreResult<PlannedColumn> {
                Ok(PlannedColumn {
                    name: field.name.clone(),
                    codec: Codec::for_field(name, field)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let data_cols: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
        let qtable = quote_ident(name);

        let (insert, select) = if kind == TableKind::Main {
            let insert = if data_cols.is_empty() {
                format!("INSERT INTO {qtable} DEFAULT VALUES")
            } else {
                format!(
                    "INSERT INTO {qtable} ({}) VALUES ({})",
                    data_cols.join(", "),
                    placeholders(data_cols.len())
                )
            };
            let select = format!(
                "SELECT {} FROM {qtable} WHERE {} = ?",
                with_id(&data_cols),
                quote_ident(ID_COLUMN)
            );
            (insert, select)
        } else {
            let mut insert_cols = vec![quote_ident(PARENT_ID_COLUMN)];
            insert_cols.extend(data_cols.iter().cloned());
            let insert = format!(
                "INSERT INTO {qtable} ({}) VALUES ({})",
                insert_cols.join(", "),
                placeholders(insert_cols.len())
            );
            // An object table without fields still yields one empty mapping per row.
            let projection = if data_cols.is_empty() {
                quote_ident(ID_COLUMN)
            } else {
                data_cols.join(", ")
            };
            let select = format!(
                "SELECT {projection} FROM {qtable} WHERE {} = ? ORDER BY {}",
                quote_ident(PARENT_ID_COLUMN),
                quote_ident(ID_COLUMN)
            );
            (insert, select)
        };

        Ok(Self {
            name: name.to_owned(),
            columns,
            layout,
            insert,
            select,
        })
    }
}

/// How a secondary table maps onto its key in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryKind {
    /// One scalar per row.
    List,
    /// One mapping per row.
    Object,
}

#[derive(Debug, Clone)]
pub struct SecondaryPlan {
    pub kind: SecondaryKind,
    pub table: TablePlan,
}

/// Every statement the store issues, precompiled from a validated schema.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    ddl: Ddl,
    main: TablePlan,
    secondary: Vec<SecondaryPlan>,
    list: String,
}

impl QueryPlan {
    /// # Errors
    /// Returns `StoreError::Schema` or `StoreError::Compile` when the schema
    /// does not compile.
    pub fn build(schema: &Schema) -> StoreResult<Self> {
        let ddl = compile(schema)?;
        let main = TablePlan::build(schema, &schema.main_table)?;
        let secondary = schema
            .secondary_tables()
            .map(|(name, table)| -> StoreResult<SecondaryPlan> {
                let kind = if table.is_list {
                    SecondaryKind::List
                } else {
                    SecondaryKind::Object
                };
                Ok(SecondaryPlan {
                    kind,
                    table: TablePlan::build(schema, name)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let data_cols: Vec<String> = main.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let list = format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT ? OFFSET ?",
            with_id(&data_cols),
            quote_ident(&main.name),
            quote_ident(ID_COLUMN)
        );

        Ok(Self {
            ddl,
            main,
            secondary,
            list,
        })
    }

    /// Table definitions in schema order.
    #[must_use]
    pub fn ddl(&self) -> &Ddl {
        &self.ddl
    }

    #[must_use]
    pub fn main(&self) -> &TablePlan {
        &self.main
    }

    /// Secondary tables in schema order.
    #[must_use]
    pub fn secondary(&self) -> &[SecondaryPlan] {
        &self.secondary
    }

    /// Main rows ordered by `id`, binding limit then offset.
    #[must_use]
    pub fn list_sql(&self) -> &str {
        &self.list
    }

    /// Main table first, then secondaries.
    pub fn tables(&self) -> impl Iterator<Item = &TablePlan> {
        std::iter::once(&self.main).chain(self.secondary.iter().map(|s| &s.table))
    }
}

fn with_id(data_cols: &[String]) -> String {
    std::iter::once(quote_ident(ID_COLUMN))
        .chain(data_cols.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const PLANT: &str = r"
main_table: plant
tables:
  plant:
    fields:
      - { name: name, type: string }
      - { name: height, type: float }
  tags:
    is_list: true
    value_field: { name: value, type: string }
  origin:
    fields:
      - { name: country, type: string }
      - { name: region, type: string }
";

    #[test]
    fn main_table_statements() {
        let plan = QueryPlan::build(&Schema::from_yaml_str(PLANT).unwrap()).unwrap();
        let main = plan.main();
        assert_eq!(
            main.insert,
            r#"INSERT INTO "plant" ("name", "height") VALUES (?, ?)"#
        );
        assert_eq!(
            main.select,
            r#"SELECT "id", "name", "height" FROM "plant" WHERE "id" = ?"#
        );
        assert_eq!(
            plan.list_sql(),
            r#"SELECT "id", "name", "height" FROM "plant" ORDER BY "id" LIMIT ? OFFSET ?"#
        );
    }

    #[test]
    fn secondary_table_statements() {
        let plan = QueryPlan::build(&Schema::from_yaml_str(PLANT).unwrap()).unwrap();
        let kinds: Vec<(&str, SecondaryKind)> = plan
            .secondary()
            .iter()
            .map(|s| (s.table.name.as_str(), s.kind))
            .collect();
        assert_eq!(
            kinds,
            [("tags", SecondaryKind::List), ("origin", SecondaryKind::Object)]
        );

        let tags = &plan.secondary()[0].table;
        assert_eq!(
            tags.insert,
            r#"INSERT INTO "tags" ("parent_id", "value") VALUES (?, ?)"#
        );
        assert_eq!(
            tags.select,
            r#"SELECT "value" FROM "tags" WHERE "parent_id" = ? ORDER BY "id""#
        );
        assert_eq!(tags.layout.len(), 3);
    }

    #[test]
    fn main_table_without_fields_uses_default_values() {
        let schema = Schema::from_yaml_str(
            "main_table: box\ntables:\n  box: {}\n  items: { is_list: true, value_field: { name: value, type: int } }\n",
        )
        .unwrap();
        let plan = QueryPlan::build(&schema).unwrap();
        assert_eq!(plan.main().insert, r#"INSERT INTO "box" DEFAULT VALUES"#);
        assert_eq!(plan.main().select, r#"SELECT "id" FROM "box" WHERE "id" = ?"#);
    }
}
