#![allow(dead_code)]

use sql_scope::prelude::*;
use tempfile::TempDir;

pub const SAMPLE_SCHEMA: &str = "CREATE TABLE sample (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    password TEXT NOT NULL
);";

pub const INSERT_SAMPLE: &str = "insert into sample(name, password) values (?name, ?password)";
pub const INSERT_MISSING_TABLE: &str = "insert into nope(name) values (?name)";

/// A file-backed SQLite pool that lives as long as its temp directory.
pub struct TestDb {
    pub db: ConfigAndPool,
    pub dir: TempDir,
}

impl TestDb {
    pub fn path(&self) -> String {
        self.dir.path().join("scope.db").to_string_lossy().into_owned()
    }
}

pub async fn sqlite_db_with(
    configure: impl FnOnce(SqliteOptionsBuilder) -> SqliteOptionsBuilder,
) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scope.db").to_string_lossy().into_owned();
    let db = configure(ConfigAndPool::sqlite_builder(path).pool_size(4))
        .build()
        .await
        .unwrap();
    db.execute_batch(&ExecContext::new(), SAMPLE_SCHEMA)
        .await
        .unwrap();
    TestDb { db, dir }
}

pub async fn sqlite_db() -> TestDb {
    sqlite_db_with(|b| b).await
}

pub fn sample(name: &str, password: &str) -> NamedParams {
    named_params! { "name" => name, "password" => password }
}

pub async fn count(db: &ConfigAndPool) -> i64 {
    let rs = db
        .query(
            &ExecContext::new(),
            "select count(*) as n from sample",
            &named_params! {},
        )
        .await
        .unwrap();
    *rs.results[0].get("n").and_then(RowValues::as_int).unwrap()
}
