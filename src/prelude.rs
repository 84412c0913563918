//! Convenient imports for common functionality.

pub use crate::named_params;

pub use crate::config::DatabaseConfig;
pub use crate::context::ExecContext;
pub use crate::error::SqlScopeError;
pub use crate::executor::AsyncDatabaseExecutor;
pub use crate::params::{NamedParams, bind_params};
pub use crate::pool::{ConfigAndPool, MiddlewarePool, PoolOptions};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::transaction::{FinalizePolicy, TxAdapter, TxHandle, TxState};
pub use crate::translation::{PlaceholderStyle, StatementKind, translate_named};
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
