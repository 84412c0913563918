use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use super::connection::run_blocking;
use crate::error::SqlScopeError;
use crate::pool::{ConfigAndPool, MiddlewarePool, PoolOptions};
use crate::transaction::FinalizePolicy;
use crate::translation::PlaceholderStyle;
use crate::types::DatabaseType;

/// Shared handle to a rusqlite connection guarded by a mutex for async access.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// bb8 manager that opens rusqlite connections on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: String, busy_timeout: Duration) -> Self {
        Self {
            db_path,
            busy_timeout,
        }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlScopeError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;
        let conn = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path)?;
            conn.busy_timeout(busy_timeout)?;
            Ok::<_, SqlScopeError>(conn)
        })
        .await??;
        Ok(Arc::new(Mutex::new(conn)))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        run_blocking(Arc::clone(conn), |guard| {
            if !guard.is_autocommit() {
                return Err(SqlScopeError::ConnectionError(
                    "pooled sqlite connection is still inside a transaction".to_string(),
                ));
            }
            guard
                .execute_batch("SELECT 1")
                .map_err(SqlScopeError::SqliteError)
        })
        .await
    }

    /// A connection handed back while still inside a transaction is discarded.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.try_lock().map_or(false, |guard| !guard.is_autocommit())
    }
}

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Duration,
    pub pool: PoolOptions,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: Duration::from_secs(5),
            pool: PoolOptions::default(),
        }
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.opts.pool.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.opts.pool.set_checkout_timeout(timeout);
        self
    }

    /// How long a statement waits on a locked database file before failing.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn param_marker(mut self, marker: char) -> Self {
        self.opts.pool.param_marker = marker;
        self
    }

    #[must_use]
    pub fn finalize_policy(mut self, policy: FinalizePolicy) -> Self {
        self.opts.pool.finalize_policy = policy;
        self
    }

    #[must_use]
    pub fn check_on_connect(mut self, check: bool) -> Self {
        self.opts.pool.check_on_connect = check;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqlScopeError` if pool creation or the optional ping fails.
    pub async fn build(self) -> Result<ConfigAndPool, SqlScopeError> {
        ConfigAndPool::new_sqlite(self.finish()).await
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn sqlite_builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Asynchronous initializer for `ConfigAndPool` with Sqlite using bb8.
    ///
    /// Opens the first connection eagerly and switches the file to WAL so pooled readers do not
    /// block behind an open write transaction.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConnectionError` if pool creation or the connection test fails.
    pub async fn new_sqlite(opts: SqliteOptions) -> Result<Self, SqlScopeError> {
        if opts.pool.pool_size == 0 {
            return Err(SqlScopeError::ConfigError(
                "pool_size must be at least 1".to_string(),
            ));
        }
        let manager = SqliteManager::new(opts.db_path.clone(), opts.busy_timeout);
        let pool = Pool::builder()
            .max_size(opts.pool.pool_size)
            .connection_timeout(opts.pool.checkout_timeout())
            .build(manager)
            .await
            .map_err(|e| {
                SqlScopeError::ConnectionError(format!("Failed to create SQLite pool: {e}"))
            })?;

        {
            let conn = pool.get().await?;
            run_blocking(Arc::clone(&*conn), |guard| {
                // in-memory databases report "memory" and keep it; that is fine
                guard
                    .query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                    .map_err(SqlScopeError::SqliteError)
            })
            .await?;
        }

        let cap = ConfigAndPool::assemble(
            MiddlewarePool::Sqlite(pool),
            DatabaseType::Sqlite,
            PlaceholderStyle::Sqlite,
            &opts.pool,
        );
        if opts.pool.check_on_connect {
            cap.ping().await?;
        }
        Ok(cap)
    }
}
