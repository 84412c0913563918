use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[cfg(feature = "postgres")]
use deadpool_postgres::{Object as PostgresObject, Pool as DeadpoolPostgresPool};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SqlScopeError;
use crate::params::NamedParams;
use crate::results::ResultSet;
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteManager, SqlitePooledConnection};
use crate::transaction::FinalizePolicy;
use crate::translation::{NamedQueryTranslator, PlaceholderStyle, StatementKind};
use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
use crate::postgres::connection as pg;
#[cfg(feature = "sqlite")]
use crate::sqlite::connection as lite;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Backend-independent pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Maximum number of open connections.
    pub pool_size: u32,
    /// How long a caller waits for a free connection, in milliseconds.
    pub checkout_timeout_ms: u64,
    /// Character that introduces a named parameter in query text.
    pub param_marker: char,
    pub finalize_policy: FinalizePolicy,
    /// Ping the database once while building the pool.
    pub check_on_connect: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            checkout_timeout_ms: 30_000,
            param_marker: crate::translation::DEFAULT_PARAM_MARKER,
            finalize_policy: FinalizePolicy::default(),
            check_on_connect: false,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    pub fn set_checkout_timeout(&mut self, timeout: Duration) {
        self.checkout_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }
}

/// Connection pool for database access
///
/// This enum wraps the different connection pool types for the
/// supported database engines.
#[derive(Clone)]
pub enum MiddlewarePool {
    /// `PostgreSQL` connection pool
    #[cfg(feature = "postgres")]
    Postgres(DeadpoolPostgresPool),
    /// `SQLite` connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(bb8::Pool<SqliteManager>),
}

impl std::fmt::Debug for MiddlewarePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => f.debug_tuple("Postgres").field(&pool.status()).finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => f.debug_tuple("Sqlite").field(&pool.state()).finish(),
        }
    }
}

/// A connection checked out of a [`MiddlewarePool`]. Returned to the pool on drop.
pub enum MiddlewarePoolConnection {
    #[cfg(feature = "postgres")]
    Postgres(PostgresObject),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePooledConnection),
}

impl std::fmt::Debug for MiddlewarePoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").field(&"<Client>").finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<Connection>").finish(),
        }
    }
}

impl MiddlewarePoolConnection {
    /// Prepare and run one translated statement with positional values.
    pub(crate) async fn run_statement(
        &self,
        sql: &str,
        values: &[RowValues],
        kind: StatementKind,
    ) -> Result<ResultSet, SqlScopeError> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => pg::execute_statement(client, sql, values, kind).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => lite::execute_statement(conn, sql, values, kind).await,
        }
    }

    /// Prepare once, then bind and run the statement for every mapping in `batch`.
    pub(crate) async fn run_bulk(
        &self,
        sql: &str,
        names: &[String],
        batch: &[NamedParams],
    ) -> Result<ResultSet, SqlScopeError> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => pg::execute_bulk(client, sql, names, batch).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => lite::execute_bulk(conn, sql, names, batch).await,
        }
    }

    /// Run parameterless SQL text, which may hold several statements.
    pub(crate) async fn run_batch(&self, sql: &str) -> Result<(), SqlScopeError> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => pg::execute_batch(client, sql).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => lite::execute_batch(conn, sql).await,
        }
    }

    pub(crate) async fn begin(&self) -> Result<(), SqlScopeError> {
        self.run_batch("BEGIN").await
    }

    pub(crate) async fn commit(&self) -> Result<(), SqlScopeError> {
        self.run_batch("COMMIT").await
    }

    pub(crate) async fn rollback(&self) -> Result<(), SqlScopeError> {
        self.run_batch("ROLLBACK").await
    }

    /// Give up a connection that may still be inside a transaction, without touching it.
    ///
    /// Postgres connections are detached from the pool and closed, which makes the server abort
    /// the transaction. `SQLite` connections go back to the pool, whose manager drops any that
    /// are not in autocommit mode.
    pub(crate) fn discard(self) {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => drop(PostgresObject::take(client)),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => drop(conn),
        }
    }

    pub(crate) async fn ping(&self) -> Result<(), SqlScopeError> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => pg::ping(client).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => lite::ping(conn).await,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    id: u64,
    // `None` once closed; taking it out drops the last shared reference to the pool.
    pool: RwLock<Option<MiddlewarePool>>,
}

/// Configuration and connection pool for a database
///
/// Cloning is cheap and every clone shares the same pool and translator settings. Closing
/// through any clone closes it for all of them.
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    /// The database type
    pub db_type: DatabaseType,
    translator: NamedQueryTranslator,
    finalize_policy: FinalizePolicy,
    state: Arc<PoolState>,
}

impl ConfigAndPool {
    pub(crate) fn assemble(
        pool: MiddlewarePool,
        db_type: DatabaseType,
        style: PlaceholderStyle,
        opts: &PoolOptions,
    ) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            pool_id = id,
            ?db_type,
            pool_size = opts.pool_size,
            "database pool ready"
        );
        Self {
            db_type,
            translator: NamedQueryTranslator::new(opts.param_marker, style),
            finalize_policy: opts.finalize_policy,
            state: Arc::new(PoolState {
                id,
                pool: RwLock::new(Some(pool)),
            }),
        }
    }

    /// Process-unique identifier of this pool; shared by all clones.
    #[must_use]
    pub fn pool_id(&self) -> u64 {
        self.state.id
    }

    #[must_use]
    pub fn translator(&self) -> &NamedQueryTranslator {
        &self.translator
    }

    #[must_use]
    pub fn finalize_policy(&self) -> FinalizePolicy {
        self.finalize_policy
    }

    /// The underlying backend pool, or `None` once closed.
    #[must_use]
    pub fn pool(&self) -> Option<MiddlewarePool> {
        self.state
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConnectionError` once the pool is closed, or the pool's checkout
    /// error (including a checkout timeout).
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, SqlScopeError> {
        let Some(pool) = self.pool() else {
            return Err(SqlScopeError::ConnectionError("pool is closed".to_string()));
        };
        match &pool {
            #[cfg(feature = "postgres")]
            MiddlewarePool::Postgres(pool) => {
                let conn: PostgresObject = pool.get().await?;
                Ok(MiddlewarePoolConnection::Postgres(conn))
            }
            #[cfg(feature = "sqlite")]
            MiddlewarePool::Sqlite(pool) => {
                let conn = pool.get_owned().await?;
                Ok(MiddlewarePoolConnection::Sqlite(conn))
            }
        }
    }

    /// Verify the database is reachable by round-tripping a trivial query.
    ///
    /// # Errors
    /// Returns the checkout or query error.
    pub async fn ping(&self) -> Result<(), SqlScopeError> {
        let conn = self.get_connection().await?;
        conn.ping().await?;
        debug!(pool_id = self.pool_id(), "ping ok");
        Ok(())
    }

    /// Stop handing out connections and release the pool. Idempotent.
    ///
    /// Idle connections are closed now. Connections already checked out (including ones held by
    /// open transactions) stay usable and are closed once the last of them is returned.
    ///
    /// # Errors
    /// Currently infallible; the `Result` leaves room for backends whose shutdown can fail.
    pub async fn close(&self) -> Result<(), SqlScopeError> {
        let taken = self
            .state
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pool) = taken else {
            return Ok(());
        };
        match pool {
            #[cfg(feature = "postgres")]
            MiddlewarePool::Postgres(pool) => pool.close(),
            #[cfg(feature = "sqlite")]
            MiddlewarePool::Sqlite(pool) => drop(pool),
        }
        info!(pool_id = self.pool_id(), "database pool closed");
        Ok(())
    }
}
