//! Named-parameter SQL execution over pooled `SQLite` and Postgres connections, with
//! transactions that propagate through nested calls.
//!
//! ```rust,no_run
//! use sql_scope::prelude::*;
//!
//! # async fn run() -> Result<(), SqlScopeError> {
//! let db = ConfigAndPool::sqlite_builder("app.db".to_string()).build().await?;
//! let ctx = ExecContext::new();
//!
//! db.wrap(&ctx, |ctx| {
//!     let db = &db;
//!     async move {
//!         db.query(
//!             &ctx,
//!             "insert into sample(name, password) values (?name, ?password)",
//!             &named_params! { "name" => "a", "password" => "b" },
//!         )
//!         .await
//!     }
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::DatabaseConfig;
pub use context::ExecContext;
pub use error::SqlScopeError;
pub use executor::AsyncDatabaseExecutor;
pub use params::{NamedParams, bind_params};
pub use pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection, PoolOptions};
pub use results::{CustomDbRow, ResultSet};
pub use transaction::{FinalizePolicy, TxAdapter, TxHandle, TxRole, TxState};
pub use translation::{
    NamedQueryTranslator, PlaceholderStyle, StatementKind, TranslatedQuery, translate_named,
};
pub use types::{DatabaseType, RowValues};
