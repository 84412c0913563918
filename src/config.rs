use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlScopeError;
use crate::pool::{ConfigAndPool, PoolOptions};
use crate::types::DatabaseType;

/// Serializable description of a pool, e.g. one section of an application's config file.
///
/// ```json
/// { "db_type": "sqlite", "path": "app.db", "pool": { "pool_size": 4 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub db_type: DatabaseType,
    /// `SQLite` database file.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub dbname: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub pool: PoolOptions,
}

impl DatabaseConfig {
    /// Parse a config from JSON text.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConfigError` if the text is not a valid config.
    pub fn from_json(text: &str) -> Result<Self, SqlScopeError> {
        serde_json::from_str(text)
            .map_err(|e| SqlScopeError::ConfigError(format!("invalid database config: {e}")))
    }
}

impl ConfigAndPool {
    /// Build a pool from a [`DatabaseConfig`].
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConfigError` when a field the backend needs is missing, or any
    /// error from building the pool.
    pub async fn from_config(config: DatabaseConfig) -> Result<Self, SqlScopeError> {
        match config.db_type {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                let path = config.path.ok_or_else(|| {
                    SqlScopeError::ConfigError("path is required for sqlite".to_string())
                })?;
                let mut opts = crate::sqlite::SqliteOptions::new(path);
                if let Some(ms) = config.busy_timeout_ms {
                    opts.busy_timeout = Duration::from_millis(ms);
                }
                opts.pool = config.pool;
                ConfigAndPool::new_sqlite(opts).await
            }
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                let opts = crate::postgres::PostgresOptions {
                    host: config.host,
                    port: config.port,
                    dbname: config.dbname,
                    user: config.user,
                    password: config.password,
                    pool: config.pool,
                };
                ConfigAndPool::new_postgres(opts).await
            }
        }
    }
}
