// SQLite backend: rusqlite connections pooled with bb8.
//
// - config: connection manager, pool options and builder
// - params: RowValues -> rusqlite values
// - query: row decoding into a ResultSet
// - connection: statement, bulk, and control execution on the blocking pool

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{
    SharedSqliteConnection, SqliteManager, SqliteOptions, SqliteOptionsBuilder,
    SqlitePooledConnection,
};
pub use params::Params;
pub use query::build_result_set;
