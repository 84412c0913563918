use std::sync::Arc;

use super::config::{SharedSqliteConnection, SqlitePooledConnection};
use super::params::Params;
use super::query::build_result_set;
use crate::error::SqlScopeError;
use crate::params::{NamedParams, bind_params};
use crate::results::ResultSet;
use crate::translation::StatementKind;
use crate::types::RowValues;

/// Run synchronous rusqlite work on the blocking pool against a shared connection.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlScopeError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlScopeError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await?
}

fn conn_handle(conn: &SqlitePooledConnection) -> SharedSqliteConnection {
    Arc::clone(&**conn)
}

fn changes_to_u64(changed: usize) -> Result<u64, SqlScopeError> {
    u64::try_from(changed).map_err(|e| {
        SqlScopeError::ExecutionError(format!("sqlite affected rows conversion error: {e}"))
    })
}

/// Prepare `query`, run it once with `values`, and normalize the outcome.
///
/// Reads return their rows; mutations return the execution summary. The statement is finalized
/// when the blocking closure returns, on success or failure.
///
/// # Errors
/// Returns [`SqlScopeError::PrepareError`] when rusqlite rejects the SQL, otherwise the
/// execution error unchanged.
pub async fn execute_statement(
    conn: &SqlitePooledConnection,
    query: &str,
    values: &[RowValues],
    kind: StatementKind,
) -> Result<ResultSet, SqlScopeError> {
    let sql_owned = query.to_owned();
    let params = Params::convert(values);
    run_blocking(conn_handle(conn), move |guard| {
        let mut stmt = guard.prepare(&sql_owned).map_err(SqlScopeError::prepare)?;
        match kind {
            StatementKind::Read => build_result_set(&mut stmt, &params),
            StatementKind::Mutation => {
                let changed = stmt.execute(params.as_params())?;
                let last_id = guard.last_insert_rowid();
                Ok(ResultSet::execution_summary(changes_to_u64(changed)?, last_id))
            }
        }
    })
    .await
}

/// Prepare `query` once and execute it for every mapping in `batch`, in order.
///
/// A mapping that lacks a parameter stops the batch; rows written by earlier iterations stay
/// written unless the connection is inside a transaction that is later rolled back.
///
/// # Errors
/// Returns the first preparation, binding, or execution error.
pub async fn execute_bulk(
    conn: &SqlitePooledConnection,
    query: &str,
    names: &[String],
    batch: &[NamedParams],
) -> Result<ResultSet, SqlScopeError> {
    let sql_owned = query.to_owned();
    let names = names.to_vec();
    let batch = batch.to_vec();
    run_blocking(conn_handle(conn), move |guard| {
        let mut stmt = guard.prepare(&sql_owned).map_err(SqlScopeError::prepare)?;
        let mut affected = 0_u64;
        let mut last_id = 0_i64;
        for named in &batch {
            let params = Params::convert(&bind_params(named, &names)?);
            let changed = stmt.execute(params.as_params())?;
            affected += changes_to_u64(changed)?;
            last_id = guard.last_insert_rowid();
        }
        Ok(ResultSet::execution_summary(affected, last_id))
    })
    .await
}

/// Run parameterless SQL, possibly several `;`-separated statements (`BEGIN`, DDL, ...).
///
/// # Errors
/// Returns the rusqlite error raised by the first failing statement.
pub async fn execute_batch(conn: &SqlitePooledConnection, sql: &str) -> Result<(), SqlScopeError> {
    let sql_owned = sql.to_owned();
    run_blocking(conn_handle(conn), move |guard| {
        guard
            .execute_batch(&sql_owned)
            .map_err(SqlScopeError::SqliteError)
    })
    .await
}

/// Round-trip a trivial query to prove the database file is usable.
///
/// # Errors
/// Returns the rusqlite error if the query fails.
pub async fn ping(conn: &SqlitePooledConnection) -> Result<(), SqlScopeError> {
    run_blocking(conn_handle(conn), |guard| {
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(SqlScopeError::SqliteError)
    })
    .await
}
