mod common;

use std::time::Duration;

use sql_scope::prelude::*;

use common::{INSERT_SAMPLE, SAMPLE_SCHEMA, count, sample, sqlite_db, sqlite_db_with};

#[tokio::test(flavor = "multi_thread")]
async fn ping_then_close() {
    let t = sqlite_db().await;
    t.db.ping().await.unwrap();
    assert!(!t.db.is_closed());

    t.db.close().await.unwrap();
    assert!(t.db.is_closed());
    // closing twice is fine
    t.db.close().await.unwrap();

    let err = t.db.ping().await.unwrap_err();
    assert!(matches!(err, SqlScopeError::ConnectionError(_)));
    let err = t
        .db
        .query(&ExecContext::new(), INSERT_SAMPLE, &sample("a", "b"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlScopeError::ConnectionError(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn close_releases_idle_sqlite_connections() {
    let t = sqlite_db().await;
    t.db.ping().await.unwrap();
    assert!(t.db.pool().is_some());

    t.db.close().await.unwrap();
    assert!(t.db.pool().is_none());

    // switching a WAL database back to rollback journaling needs the only open connection
    let raw = rusqlite::Connection::open(t.path()).unwrap();
    raw.busy_timeout(Duration::ZERO).unwrap();
    let mode: String = raw
        .query_row("PRAGMA journal_mode = DELETE", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "delete");
}

#[tokio::test(flavor = "multi_thread")]
async fn transaction_outlives_close_then_releases_its_connection() {
    let t = sqlite_db().await;
    let tx = t.db.begin_transaction().await.unwrap();
    t.db.close().await.unwrap();

    let ctx = ExecContext::new().with_transaction(tx.clone());
    t.db.query(&ctx, INSERT_SAMPLE, &sample("a", "b"))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    drop(ctx);
    drop(tx);

    let raw = rusqlite::Connection::open(t.path()).unwrap();
    raw.busy_timeout(Duration::ZERO).unwrap();
    let n: i64 = raw
        .query_row("select count(*) from sample", [], |row| row.get(0))
        .unwrap();
    assert_eq!(n, 1);
    let mode: String = raw
        .query_row("PRAGMA journal_mode = DELETE", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "delete");
}

#[tokio::test(flavor = "multi_thread")]
async fn clones_share_pool_identity_and_closed_flag() {
    let t = sqlite_db().await;
    let clone = t.db.clone();
    assert_eq!(clone.pool_id(), t.db.pool_id());

    clone.close().await.unwrap();
    assert!(t.db.is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_pool_times_out_checkout() {
    let t = sqlite_db_with(|b| b.pool_size(1).checkout_timeout(Duration::from_millis(200))).await;

    let tx = t.db.begin_transaction().await.unwrap();
    let err = t
        .db
        .query(&ExecContext::new(), INSERT_SAMPLE, &sample("a", "b"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlScopeError::ConnectionError(_)), "{err:?}");

    tx.rollback().await.unwrap();
    t.db.query(&ExecContext::new(), INSERT_SAMPLE, &sample("a", "b"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn deadline_bounds_statements() {
    let t = sqlite_db().await;
    let expired = ExecContext::new().with_deadline(tokio::time::Instant::now());
    let err = t
        .db
        .query(&expired, "select * from sample", &named_params! {})
        .await
        .unwrap_err();
    assert!(matches!(err, SqlScopeError::DeadlineExceeded(_)), "{err:?}");

    let roomy = ExecContext::new().with_timeout(Duration::from_secs(30));
    t.db.query(&roomy, INSERT_SAMPLE, &sample("a", "b"))
        .await
        .unwrap();
    assert_eq!(count(&t.db).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn check_on_connect_pings_while_building() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checked.db").to_string_lossy().into_owned();
    let db = ConfigAndPool::sqlite_builder(path)
        .check_on_connect(true)
        .busy_timeout(Duration::from_millis(500))
        .build()
        .await
        .unwrap();
    assert_eq!(db.db_type, DatabaseType::Sqlite);
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_pool_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.db").to_string_lossy().into_owned();
    let err = ConfigAndPool::sqlite_builder(path)
        .pool_size(0)
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlScopeError::ConfigError(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn builds_from_json_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.db");
    let text = serde_json::json!({
        "db_type": "sqlite",
        "path": path.to_string_lossy(),
        "busy_timeout_ms": 250,
        "pool": { "pool_size": 2, "param_marker": "@", "finalize_policy": "lenient" }
    })
    .to_string();

    let db = ConfigAndPool::from_config(DatabaseConfig::from_json(&text).unwrap())
        .await
        .unwrap();
    assert_eq!(db.finalize_policy(), FinalizePolicy::Lenient);
    assert_eq!(db.translator().marker(), '@');

    let ctx = ExecContext::new();
    db.execute_batch(&ctx, SAMPLE_SCHEMA).await.unwrap();
    db.query(
        &ctx,
        "insert into sample(name, password) values (@name, @password)",
        &sample("a", "b"),
    )
    .await
    .unwrap();
    assert_eq!(count(&db).await, 1);
}
