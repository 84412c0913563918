use std::time::Duration;

use deadpool_postgres::{Config as PgConfig, PoolConfig, Runtime};
use tokio_postgres::NoTls;

use crate::error::SqlScopeError;
use crate::pool::{ConfigAndPool, MiddlewarePool, PoolOptions};
use crate::transaction::FinalizePolicy;
use crate::translation::PlaceholderStyle;
use crate::types::DatabaseType;

/// Connection settings for a Postgres pool. Every connection field is required.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool: PoolOptions,
}

impl PostgresOptions {
    fn validate(&self) -> Result<(), SqlScopeError> {
        if self.dbname.is_none() {
            return Err(SqlScopeError::ConfigError("dbname is required".to_string()));
        }
        if self.host.is_none() {
            return Err(SqlScopeError::ConfigError("host is required".to_string()));
        }
        if self.port.is_none() {
            return Err(SqlScopeError::ConfigError("port is required".to_string()));
        }
        if self.user.is_none() {
            return Err(SqlScopeError::ConfigError("user is required".to_string()));
        }
        if self.password.is_none() {
            return Err(SqlScopeError::ConfigError(
                "password is required".to_string(),
            ));
        }
        if self.pool.pool_size == 0 {
            return Err(SqlScopeError::ConfigError(
                "pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_deadpool(&self) -> Result<PgConfig, SqlScopeError> {
        let max_size = usize::try_from(self.pool.pool_size)
            .map_err(|e| SqlScopeError::ConfigError(format!("pool_size out of range: {e}")))?;
        let mut pool_cfg = PoolConfig::new(max_size);
        pool_cfg.timeouts.wait = Some(self.pool.checkout_timeout());

        let mut cfg = PgConfig::new();
        cfg.host.clone_from(&self.host);
        cfg.port = self.port;
        cfg.dbname.clone_from(&self.dbname);
        cfg.user.clone_from(&self.user);
        cfg.password.clone_from(&self.password);
        cfg.pool = Some(pool_cfg);
        Ok(cfg)
    }
}

/// Fluent builder for Postgres options.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    opts: PostgresOptions,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = Some(port);
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.opts.dbname = Some(dbname.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
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
    pub fn finish(self) -> PostgresOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for Postgres.
    ///
    /// # Errors
    /// Returns `SqlScopeError` if validation, pool creation, or the optional ping fails.
    pub async fn build(self) -> Result<ConfigAndPool, SqlScopeError> {
        ConfigAndPool::new_postgres(self.finish()).await
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn postgres_builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::new()
    }

    /// Asynchronous initializer for `ConfigAndPool` with Postgres.
    ///
    /// The pool is created lazily; no connection is opened unless `check_on_connect` is set.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConfigError` if required fields are missing or
    /// `SqlScopeError::ConnectionError` if pool creation fails.
    pub async fn new_postgres(opts: PostgresOptions) -> Result<Self, SqlScopeError> {
        opts.validate()?;

        let pg_pool = opts
            .to_deadpool()?
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                SqlScopeError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
            })?;

        let cap = ConfigAndPool::assemble(
            MiddlewarePool::Postgres(pg_pool),
            DatabaseType::Postgres,
            PlaceholderStyle::Postgres,
            &opts.pool,
        );
        if opts.pool.check_on_connect {
            cap.ping().await?;
        }
        Ok(cap)
    }
}
