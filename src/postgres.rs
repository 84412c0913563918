// Postgres backend: tokio-postgres clients pooled with deadpool.
//
// - config: options, validation and pool construction
// - params: RowValues -> ToSql
// - query: row decoding into a ResultSet
// - connection: statement, bulk, and control execution

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{PostgresOptions, PostgresOptionsBuilder};
pub use params::Params;
pub use query::{build_result_set_from_statement, postgres_extract_value};
