#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Provisioning and layout verification.

use cs_db::{ConnectOpts, DbHandle};
use cs_schema::Schema;
use tree_store::{StoreError, TreeStore};

const PLANT: &str = include_str!("fixtures/plant.yaml");

async fn open() -> TreeStore {
    let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default())
        .await
        .unwrap();
    TreeStore::new(db, Schema::from_yaml_str(PLANT).unwrap()).unwrap()
}

async fn table_names(store: &TreeStore) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(store.db().pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn provision_creates_one_table_per_schema_table() {
    let store = open().await;
    store.provision().await.unwrap();
    assert_eq!(table_names(&store).await, ["origin", "plant", "tags"]);

    let index: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'tags_parent_id_idx'",
    )
    .fetch_optional(store.db().pool())
    .await
    .unwrap();
    assert!(index.is_some());
}

#[tokio::test]
async fn provision_is_repeatable() {
    let store = open().await;
    store.provision().await.unwrap();
    store.provision().await.unwrap();
    store.verify().await.unwrap();
}

#[tokio::test]
async fn verify_reports_missing_tables() {
    let store = open().await;
    let err = store.verify().await.unwrap_err();
    assert!(
        matches!(err, StoreError::LayoutMismatch { ref table, ref detail } if table == "plant" && detail == "table does not exist")
    );
}

#[tokio::test]
async fn verify_reports_drifted_columns() {
    let store = open().await;
    store.provision().await.unwrap();
    sqlx::query(r#"DROP TABLE "origin""#)
        .execute(store.db().pool())
        .await
        .unwrap();
    sqlx::query(r#"CREATE TABLE "origin" ("id" INTEGER PRIMARY KEY, "parent_id" INTEGER NOT NULL, "country" BLOB)"#)
        .execute(store.db().pool())
        .await
        .unwrap();

    let err = store.verify().await.unwrap_err();
    match err {
        StoreError::LayoutMismatch { table, detail } => {
            assert_eq!(table, "origin");
            assert_eq!(detail, "column 'country' has type BLOB, expected TEXT");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_ddl_matches_what_provision_runs() {
    let store = open().await;
    let ddl = store.plan().ddl();
    assert_eq!(ddl.len(), 3);
    assert!(ddl["plant"][0].starts_with(r#"CREATE TABLE IF NOT EXISTS "plant""#));
    assert!(table_names(&store).await.is_empty());
}
