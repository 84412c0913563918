use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlScopeError {
    /// A named token in the query has no entry in the parameter mapping.
    #[error("parameter '{0}' is missing")]
    MissingParameter(String),

    #[error("operation not permitted: {0}")]
    OperationNotPermitted(String),

    /// The backend refused to prepare the statement. Displays the backend message as-is.
    #[error("{0}")]
    PrepareError(#[source] Box<SqlScopeError>),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] deadpool_postgres::PoolError),

    #[error("Result type mismatch: {0}")]
    ResultTypeMismatch(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("transaction {0} is marked rollback-only")]
    RollbackOnly(u64),

    #[error("transaction {0} was rolled back after a nested unit of work failed")]
    TransactionRolledBack(u64),

    #[error("deadline exceeded while {0}")]
    DeadlineExceeded(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqlScopeError {
    pub(crate) fn prepare(err: impl Into<SqlScopeError>) -> Self {
        SqlScopeError::PrepareError(Box::new(err.into()))
    }

    /// True when the backend rejected the statement before it ran.
    #[must_use]
    pub fn is_prepare_error(&self) -> bool {
        matches!(self, SqlScopeError::PrepareError(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<bb8::RunError<SqlScopeError>> for SqlScopeError {
    fn from(err: bb8::RunError<SqlScopeError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                SqlScopeError::ConnectionError("SQLite pool checkout timed out".into())
            }
        }
    }
}

impl From<tokio::task::JoinError> for SqlScopeError {
    fn from(err: tokio::task::JoinError) -> Self {
        SqlScopeError::ExecutionError(format!("blocking task join error: {err}"))
    }
}
