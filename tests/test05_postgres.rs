#![cfg(feature = "postgres")]

use sql_scope::prelude::*;

/// Build a pool from `SQL_SCOPE_PG_*`; `None` when no server is configured.
async fn postgres_db() -> Option<ConfigAndPool> {
    let host = std::env::var("SQL_SCOPE_PG_HOST").ok()?;
    let port = std::env::var("SQL_SCOPE_PG_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);
    let dbname = std::env::var("SQL_SCOPE_PG_DB").unwrap_or_else(|_| "postgres".to_string());
    let user = std::env::var("SQL_SCOPE_PG_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("SQL_SCOPE_PG_PASSWORD").unwrap_or_default();

    let db = ConfigAndPool::postgres_builder()
        .host(host)
        .port(port)
        .dbname(dbname)
        .user(user)
        .password(password)
        .pool_size(4)
        .check_on_connect(true)
        .build()
        .await
        .unwrap();
    Some(db)
}

fn table_name(prefix: &str) -> String {
    let ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{}_{ns}", std::process::id())
}

async fn count(db: &ConfigAndPool, table: &str) -> i64 {
    let rs = db
        .query(
            &ExecContext::new(),
            &format!("select count(*) as n from {table}"),
            &named_params! {},
        )
        .await
        .unwrap();
    *rs.results[0].get("n").and_then(RowValues::as_int).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn postgres_query_bulk_and_wrap() {
    let Some(db) = postgres_db().await else {
        eprintln!("SQL_SCOPE_PG_HOST not set; skipping");
        return;
    };
    let ctx = ExecContext::new();
    let table = table_name("scope_sample");
    db.execute_batch(
        &ctx,
        &format!("CREATE TABLE {table} (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, password TEXT NOT NULL)"),
    )
    .await
    .unwrap();
    let insert = format!("insert into {table}(name, password) values (?name, ?password)");

    let summary = db
        .query(&ctx, &insert, &named_params! { "name" => "a", "password" => "b" })
        .await
        .unwrap();
    assert_eq!(summary.affected_rows().unwrap(), 1);
    assert_eq!(summary.last_insert_id().unwrap(), 0);

    let rows = db
        .query(
            &ctx,
            &format!("select id, name from {table} where name = ?name and name = ?name"),
            &named_params! { "name" => "a" },
        )
        .await
        .unwrap();
    assert_eq!(rows.results[0].get("id"), Some(&RowValues::Int(1)));

    let bulk = db
        .query_bulk(
            &ctx,
            &insert,
            &[
                named_params! { "name" => "b", "password" => "1" },
                named_params! { "name" => "c", "password" => "2" },
            ],
        )
        .await
        .unwrap();
    assert_eq!(bulk.affected_rows().unwrap(), 2);

    let db_ref = &db;
    let insert_ref = &insert;
    let err = db
        .wrap(&ctx, |ctx| async move {
            db_ref
                .wrap(&ctx, |inner| async move {
                    db_ref
                        .query(&inner, insert_ref, &named_params! { "name" => "d", "password" => "3" })
                        .await
                })
                .await?;
            db_ref
                .query(&ctx, "insert into scope_missing_table(x) values (?x)", &named_params! { "x" => 1 })
                .await
        })
        .await
        .unwrap_err();
    assert!(err.is_prepare_error(), "{err:?}");
    assert_eq!(count(&db, &table).await, 3);

    db.execute_batch(&ctx, &format!("DROP TABLE {table}"))
        .await
        .unwrap();
    db.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn postgres_deadline_around_begin_keeps_pool_in_autocommit() {
    let Some(db) = postgres_db().await else {
        eprintln!("SQL_SCOPE_PG_HOST not set; skipping");
        return;
    };
    let Some(observer) = postgres_db().await else {
        return;
    };
    let ctx = ExecContext::new();
    let table = table_name("scope_deadline");
    db.execute_batch(&ctx, &format!("CREATE TABLE {table} (name TEXT NOT NULL)"))
        .await
        .unwrap();
    let insert = format!("insert into {table}(name) values (?name)");

    let db_ref = &db;
    let insert_ref = &insert;
    for micros in [0_u64, 10, 100, 500, 1_000, 5_000, 20_000] {
        let bounded = ExecContext::new().with_timeout(std::time::Duration::from_micros(micros));
        let _ = db
            .wrap(&bounded, |ctx| async move {
                db_ref
                    .query(&ctx, insert_ref, &named_params! { "name" => "w" })
                    .await
            })
            .await;
    }

    // pool-path writes on every connection must be visible to an independent pool
    for _ in 0..4 {
        db.query(&ctx, &insert, &named_params! { "name" => "after" })
            .await
            .unwrap();
    }
    let rows = observer
        .query(
            &ctx,
            &format!("select name from {table} where name = ?name"),
            &named_params! { "name" => "after" },
        )
        .await
        .unwrap();
    assert_eq!(rows.results.len(), 4);

    db.execute_batch(&ctx, &format!("DROP TABLE {table}"))
        .await
        .unwrap();
    db.close().await.unwrap();
    observer.close().await.unwrap();
}
