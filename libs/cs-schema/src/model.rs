//! Schema model: the declared shape of one hierarchical object.
//!
//! A schema names a main table (top-level scalar fields) and any number of
//! secondary tables owned by it. A secondary table is either list-valued
//! (one row per element of a repeated scalar, stored in its `value_field`)
//! or object-valued (one row per nested field set).

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Synthetic autoincrement primary key present on every table.
pub const ID_COLUMN: &str = "id";
/// Owning main-table id present on every secondary table.
pub const PARENT_ID_COLUMN: &str = "parent_id";

/// Logical type of a field.
///
/// Read from its string name; names outside the known set are kept as
/// [`FieldType::Unknown`] and rejected when the schema is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// ISO-8601 timestamp or date, stored as text.
    Datetime,
    Unknown(String),
}

impl FieldType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Unknown(name) => name,
        }
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" | "text" => FieldType::String,
            "integer" | "int" => FieldType::Integer,
            "float" | "real" | "double" => FieldType::Float,
            "boolean" | "bool" => FieldType::Boolean,
            "datetime" | "timestamp" => FieldType::Datetime,
            _ => FieldType::Unknown(name),
        }
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        FieldType::from(name.to_owned())
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Unknown(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Table {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_list: bool,
    /// Element column of a list table; ignored for other tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<Field>,
}

impl Table {
    /// Table holding a set of named fields (main or object-valued).
    #[must_use]
    pub fn object(fields: Vec<Field>) -> Self {
        Self {
            fields,
            is_list: false,
            value_field: None,
        }
    }

    /// Table holding one scalar per row.
    #[must_use]
    pub fn list(value_field: Field) -> Self {
        Self {
            fields: Vec::new(),
            is_list: true,
            value_field: Some(value_field),
        }
    }

    /// Columns carrying object data, in declaration order: the value field
    /// for list tables, the declared fields otherwise.
    #[must_use]
    pub fn data_fields(&self) -> &[Field] {
        match (&self.value_field, self.is_list) {
            (Some(value_field), true) => std::slice::from_ref(value_field),
            (None, true) => &[],
            (_, false) => &self.fields,
        }
    }
}

/// Structural role of a table within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Main,
    ListValued,
    ObjectValued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    pub main_table: String,
    /// Tables in declaration order.
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    #[must_use]
    pub fn new(main_table: impl Into<String>, tables: IndexMap<String, Table>) -> Self {
        Self {
            main_table: main_table.into(),
            tables,
        }
    }

    /// Parse a YAML schema document and validate it.
    ///
    /// # Errors
    /// Returns `SchemaError::Parse` for malformed documents and any
    /// validation error from [`Schema::validate`].
    pub fn from_yaml_str(src: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_saphyr::from_str(src).map_err(|e| SchemaError::Parse {
            format: "YAML",
            message: e.to_string(),
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse a JSON schema document and validate it.
    ///
    /// # Errors
    /// Returns `SchemaError::Parse` for malformed documents and any
    /// validation error from [`Schema::validate`].
    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(src).map_err(|e| SchemaError::Parse {
            format: "JSON",
            message: e.to_string(),
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// # Errors
    /// Returns `SchemaError::MissingMainTable` if the main table is not declared.
    pub fn main(&self) -> Result<&Table, SchemaError> {
        self.tables
            .get(&self.main_table)
            .ok_or_else(|| SchemaError::MissingMainTable {
                main_table: self.main_table.clone(),
            })
    }

    /// # Errors
    /// Returns `SchemaError::UnknownTable` if `name` is not declared.
    pub fn table(&self, name: &str) -> Result<&Table, SchemaError> {
        self.tables
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTable {
                table: name.to_owned(),
            })
    }

    /// Kind of the table declared as `name`, judged structurally.
    #[must_use]
    pub fn kind_of(&self, name: &str, table: &Table) -> TableKind {
        if name == self.main_table {
            TableKind::Main
        } else if table.is_list {
            TableKind::ListValued
        } else {
            TableKind::ObjectValued
        }
    }

    /// Every table except the main one, in schema order.
    pub fn secondary_tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables
            .iter()
            .filter(|(name, _)| **name != self.main_table)
            .map(|(name, table)| (name.as_str(), table))
    }

    /// Check the structural invariants of the schema.
    ///
    /// Identifiers checked here are later spliced into SQL literally, so
    /// only ASCII letters, digits and underscores are accepted. `SQLite`
    /// matches names without regard to ASCII case, so uniqueness and
    /// reserved names are compared case-folded.
    ///
    /// # Errors
    /// Returns the first `SchemaError` found, in schema order.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let main = self.main()?;
        if main.is_list {
            return Err(SchemaError::MainTableIsList {
                table: self.main_table.clone(),
            });
        }

        let mut table_names: HashMap<String, &str> = HashMap::new();
        for (name, table) in &self.tables {
            if !is_identifier(name) {
                return Err(SchemaError::InvalidIdentifier {
                    table: name.clone(),
                    name: name.clone(),
                });
            }
            let folded = name.to_ascii_lowercase();
            if folded.starts_with(SQLITE_RESERVED_PREFIX) {
                return Err(SchemaError::ReservedTableName {
                    table: name.clone(),
                });
            }
            if let Some(existing) = table_names.insert(folded, name.as_str()) {
                return Err(SchemaError::DuplicateTable {
                    table: name.clone(),
                    existing: existing.to_owned(),
                });
            }

            if table.is_list {
                if table.value_field.is_none() {
                    return Err(SchemaError::MissingValueField {
                        table: name.clone(),
                    });
                }
                if !table.fields.is_empty() {
                    return Err(SchemaError::ListTableWithFields {
                        table: name.clone(),
                    });
                }
            }

            let mut seen = HashSet::new();
            for field in table.data_fields() {
                if !is_identifier(&field.name) {
                    return Err(SchemaError::InvalidIdentifier {
                        table: name.clone(),
                        name: field.name.clone(),
                    });
                }
                if field.name.eq_ignore_ascii_case(ID_COLUMN)
                    || field.name.eq_ignore_ascii_case(PARENT_ID_COLUMN)
                {
                    return Err(SchemaError::ReservedField {
                        table: name.clone(),
                        field: field.name.clone(),
                    });
                }
                if !seen.insert(field.name.to_ascii_lowercase()) {
                    return Err(SchemaError::DuplicateField {
                        table: name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        for (name, _) in self.secondary_tables() {
            if main.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name)) {
                return Err(SchemaError::NameCollision {
                    table: name.to_owned(),
                    main_table: self.main_table.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Prefix `SQLite` keeps for its internal tables.
const SQLITE_RESERVED_PREFIX: &str = "sqlite_";

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

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
    fn valid_schema_passes() {
        assert_eq!(plant_schema().validate(), Ok(()));
    }

    #[test]
    fn missing_main_table_is_rejected() {
        let mut schema = plant_schema();
        schema.main_table = "tree".to_owned();
        assert_eq!(
            schema.validate(),
            Err(SchemaError::MissingMainTable {
                main_table: "tree".to_owned()
            })
        );
    }

    #[test]
    fn list_table_needs_value_field() {
        let mut schema = plant_schema();
        schema.tables["tags"].value_field = None;
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::MissingValueField { table }) if table == "tags"
        ));
    }

    #[test]
    fn list_table_rejects_declared_fields() {
        let mut schema = plant_schema();
        schema.tables["tags"].fields.push(Field::new("extra", "string"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::ListTableWithFields { .. })
        ));
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let mut schema = plant_schema();
        schema.tables["origin"]
            .fields
            .push(Field::new("country", "string"));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateField {
                table: "origin".to_owned(),
                field: "country".to_owned()
            })
        );
    }

    #[test]
    fn reserved_and_malformed_names_are_rejected() {
        let mut schema = plant_schema();
        schema.tables["plant"].fields.push(Field::new("id", "integer"));
        assert!(matches!(schema.validate(), Err(SchemaError::ReservedField { .. })));

        let mut schema = plant_schema();
        schema.tables["plant"]
            .fields
            .push(Field::new("name; DROP TABLE plant", "string"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidIdentifier { .. })
        ));

        let mut schema = plant_schema();
        schema
            .tables
            .insert("1bad".to_owned(), Table::list(Field::new("v", "string")));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn table_names_differing_only_in_case_clash() {
        let mut schema = plant_schema();
        schema
            .tables
            .insert("Tags".to_owned(), Table::list(Field::new("value", "string")));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateTable {
                table: "Tags".to_owned(),
                existing: "tags".to_owned()
            })
        );
    }

    #[test]
    fn field_names_differing_only_in_case_clash() {
        let mut schema = plant_schema();
        schema.tables["plant"].fields.push(Field::new("Name", "string"));
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateField {
                table: "plant".to_owned(),
                field: "Name".to_owned()
            })
        );
    }

    #[test]
    fn reserved_names_ignore_case() {
        for reserved in ["ID", "Parent_Id"] {
            let mut schema = plant_schema();
            schema.tables["origin"]
                .fields
                .push(Field::new(reserved, "integer"));
            assert!(
                matches!(schema.validate(), Err(SchemaError::ReservedField { field, .. }) if field == reserved),
                "{reserved}"
            );
        }

        let mut schema = plant_schema();
        schema.tables["plant"].fields.push(Field::new("TAGS", "string"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::NameCollision { table, .. }) if table == "tags"
        ));
    }

    #[test]
    fn sqlite_internal_prefix_is_rejected() {
        for name in ["sqlite_sequence", "SQLite_stat1"] {
            let mut schema = plant_schema();
            schema
                .tables
                .insert(name.to_owned(), Table::list(Field::new("v", "string")));
            assert_eq!(
                schema.validate(),
                Err(SchemaError::ReservedTableName {
                    table: name.to_owned()
                })
            );
        }
    }

    #[test]
    fn secondary_table_cannot_shadow_main_field() {
        let mut schema = plant_schema();
        schema.tables["plant"].fields.push(Field::new("tags", "string"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::NameCollision { table, .. }) if table == "tags"
        ));
    }

    #[test]
    fn main_table_cannot_be_a_list() {
        let mut schema = plant_schema();
        schema.tables["plant"] = Table::list(Field::new("value", "string"));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::MainTableIsList { .. })
        ));
    }

    #[test]
    fn kinds_and_secondary_order() {
        let schema = plant_schema();
        let kinds: Vec<(&str, TableKind)> = schema
            .secondary_tables()
            .map(|(name, table)| (name, schema.kind_of(name, table)))
            .collect();
        assert_eq!(
            kinds,
            [
                ("tags", TableKind::ListValued),
                ("origin", TableKind::ObjectValued)
            ]
        );
        assert_eq!(
            schema.kind_of("plant", schema.main().unwrap()),
            TableKind::Main
        );
    }

    #[test]
    fn field_type_names_and_aliases() {
        assert_eq!(FieldType::from("INT"), FieldType::Integer);
        assert_eq!(FieldType::from("bool"), FieldType::Boolean);
        assert_eq!(FieldType::from("timestamp"), FieldType::Datetime);
        assert_eq!(
            FieldType::from("uuid"),
            FieldType::Unknown("uuid".to_owned())
        );
        assert_eq!(String::from(FieldType::Float), "float");
    }

    #[test]
    fn parses_yaml_document_in_declaration_order() {
        let schema = Schema::from_yaml_str(
            r"
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
",
        )
        .unwrap();
        let names: Vec<&str> = schema.tables.keys().map(String::as_str).collect();
        assert_eq!(names, ["plant", "tags", "origin"]);
        assert_eq!(schema.tables["plant"].fields[1].ty, FieldType::Float);
    }

    #[test]
    fn parse_errors_are_schema_errors() {
        assert!(matches!(
            Schema::from_json_str("{not json"),
            Err(SchemaError::Parse { format: "JSON", .. })
        ));
        assert!(matches!(
            Schema::from_json_str(r#"{"main_table": "x", "tables": {}}"#),
            Err(SchemaError::MissingMainTable { .. })
        ));
    }
}
