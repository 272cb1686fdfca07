//! Runs against a live server named by `KV_TEST_POSTGRES_URL`; every test
//! returns early when it is unset.

use super::*;
use kv_core::{MigrationDescriptor, MigrationName};
use std::time::Duration;

fn server_url() -> Option<String> {
    match std::env::var("KV_TEST_POSTGRES_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            eprintln!("KV_TEST_POSTGRES_URL not set; skipping");
            None
        }
    }
}

/// Per-test table and lock names so tests can share one database.
fn unique(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..12])
}

async fn open(url: &str, history: &str) -> PostgresBackend {
    let tables = HistoryTables::new(history, format!("{history}_lock")).unwrap();
    let db = PostgresBackend::connect(url, tables).await.unwrap();
    db.ensure_schema().await.unwrap();
    db
}

async fn drop_table(db: &PostgresBackend, table: &str) {
    db.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
        .await
        .unwrap();
}

fn record(id: i64) -> HistoryRecord {
    let descriptor = MigrationDescriptor::reversible(
        id,
        MigrationName::try_new(format!("m{id}")).unwrap(),
        "SELECT 1;",
        "SELECT 0;",
    );
    HistoryRecord::for_descriptor(&descriptor, Utc::now())
}

fn fast_lock(key: &str) -> LockOptions {
    LockOptions::new(key)
        .with_timeout(Duration::from_millis(300))
        .with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_record_and_remove_round_trip() {
    let Some(url) = server_url() else { return };
    let history = unique("kv_hist");
    let db = open(&url, &history).await;
    db.ensure_schema().await.unwrap();

    db.record(&record(2)).await.unwrap();
    db.record(&record(1)).await.unwrap();
    let applied = db.applied().await.unwrap();
    let ids: Vec<i64> = applied.iter().map(|r| r.migration_id.value()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(applied[0].name, "m1");

    let err = db.record(&record(1)).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::History(HistoryError::AlreadyApplied(id)) if id == MigrationId::new(1)
    ));

    db.remove(MigrationId::new(2)).await.unwrap();
    let err = db.remove(MigrationId::new(2)).await.unwrap_err();
    assert!(matches!(err, DbError::History(HistoryError::NotApplied(_))));

    drop_table(&db, &history).await;
}

#[tokio::test]
async fn test_multi_statement_batch_rolls_back_with_history() {
    let Some(url) = server_url() else { return };
    let history = unique("kv_hist");
    let created = unique("kv_made");
    let db = open(&url, &history).await;

    db.begin().await.unwrap();
    db.execute_batch(&format!(
        "CREATE TABLE {created} (id INT); INSERT INTO {created} VALUES (1); INSERT INTO {created} VALUES (2);"
    ))
    .await
    .unwrap();
    db.record(&record(1)).await.unwrap();
    db.rollback().await.unwrap();

    assert!(db.applied().await.unwrap().is_empty());
    let err = db
        .execute_batch(&format!("SELECT * FROM {created}"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ExecutionError(_)), "got {err}");

    drop_table(&db, &history).await;
}

#[tokio::test]
async fn test_advisory_lock_excludes_second_session() {
    let Some(url) = server_url() else { return };
    let history = unique("kv_hist");
    let key = unique("kv_lock");
    let first = open(&url, &history).await;
    let second = open(&url, &history).await;

    first.acquire_lock(&fast_lock(&key)).await.unwrap();
    // finds the held lock in pg_locks from its split classid/objid
    first.refresh_lock().await.unwrap();

    let err = second.acquire_lock(&fast_lock(&key)).await.unwrap_err();
    assert!(matches!(err, DbError::LockTimeout { .. }), "got {err}");

    first.release_lock().await.unwrap();
    second.acquire_lock(&fast_lock(&key)).await.unwrap();
    second.refresh_lock().await.unwrap();
    second.release_lock().await.unwrap();

    assert!(first.refresh_lock().await.is_err());
    drop_table(&first, &history).await;
}

#[tokio::test]
async fn test_refresh_detects_lock_released_behind_our_back() {
    let Some(url) = server_url() else { return };
    let history = unique("kv_hist");
    let key = unique("kv_lock");
    let db = open(&url, &history).await;

    db.acquire_lock(&fast_lock(&key)).await.unwrap();
    db.execute_batch(&format!("SELECT pg_advisory_unlock({})", advisory_key(&key)))
        .await
        .unwrap();
    let err = db.refresh_lock().await.unwrap_err();
    assert!(matches!(err, DbError::LockLost { .. }), "got {err}");

    db.release_lock().await.unwrap();
    drop_table(&db, &history).await;
}
