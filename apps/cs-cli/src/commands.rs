//! Command implementations. Results go to stdout, diagnostics to the log.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cs_db::build_db_handle;
use cs_schema::{Schema, Value};
use tree_store::{PageRequest, TreeStore};

use crate::config::AppConfig;

/// Read the schema named by the config. `.json` files are JSON, anything else YAML.
pub fn load_schema(config: &AppConfig) -> Result<Schema> {
    let Some(path) = config.schema.as_deref() else {
        bail!("no schema given: pass --schema or set `schema` in the config file");
    };
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    let schema = if is_json(path) {
        Schema::from_json_str(&src)
    } else {
        Schema::from_yaml_str(&src)
    };
    schema.with_context(|| format!("invalid schema {}", path.display()))
}

pub async fn open_store(config: &AppConfig, schema: Schema) -> Result<TreeStore> {
    let db = build_db_handle(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.dsn))?;
    Ok(TreeStore::new(db, schema)?)
}

/// Print the table definitions; the database is not opened.
pub fn print_schema(schema: &Schema) -> Result<()> {
    let ddl = cs_schema::compile(schema)?;
    for statements in ddl.values() {
        for statement in statements {
            println!("{statement};");
        }
    }
    Ok(())
}

pub async fn create(store: &TreeStore) -> Result<()> {
    store.provision().await.context("failed to create tables")?;
    println!("DB created");
    Ok(())
}

pub async fn insert(store: &TreeStore, file: &Path) -> Result<()> {
    let tree = load_document(file)?;
    let id = store
        .insert(&tree)
        .await
        .with_context(|| format!("failed to insert {}", file.display()))?;
    println!("Data inserted with id {id}");
    Ok(())
}

pub async fn get(store: &TreeStore, id: i64) -> Result<()> {
    let tree = store
        .get(id)
        .await
        .with_context(|| format!("failed to get object {id}"))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

pub async fn list(store: &TreeStore, request: PageRequest) -> Result<()> {
    let page = store.list(request).await.context("failed to list objects")?;
    if page.items.is_empty() {
        println!("No objects at offset {}", page.offset);
    } else {
        let last = page
            .offset
            .saturating_add(u64::try_from(page.count).unwrap_or(u64::MAX))
            .saturating_sub(1);
        println!("Listing objects {}-{last}", page.offset);
    }
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

pub async fn check(store: &TreeStore) -> Result<()> {
    store
        .verify()
        .await
        .context("database layout does not match the schema")?;
    println!("Layout matches schema");
    Ok(())
}

/// `-` reads stdin as YAML (which also accepts JSON).
fn load_document(file: &Path) -> Result<Value> {
    let (src, json) = if file == Path::new("-") {
        let mut src = String::new();
        std::io::stdin()
            .read_to_string(&mut src)
            .context("failed to read document from stdin")?;
        (src, false)
    } else {
        let src = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        (src, is_json(file))
    };

    if json {
        serde_json::from_str(&src).with_context(|| format!("invalid JSON in {}", file.display()))
    } else {
        serde_saphyr::from_str(&src).with_context(|| format!("invalid YAML in {}", file.display()))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
