use deadpool_postgres::Object;

use super::params::Params;
use super::query::build_result_set_from_statement;
use crate::error::SqlScopeError;
use crate::params::{NamedParams, bind_params};
use crate::results::ResultSet;
use crate::translation::StatementKind;
use crate::types::RowValues;

/// Prepare `query`, run it once with `values`, and normalize the outcome.
///
/// Mutations report the driver's affected-row count; Postgres has no last-insert id so it is
/// always 0.
///
/// # Errors
/// Returns [`SqlScopeError::PrepareError`] when the server rejects the statement, otherwise the
/// execution error unchanged.
pub async fn execute_statement(
    client: &Object,
    query: &str,
    values: &[RowValues],
    kind: StatementKind,
) -> Result<ResultSet, SqlScopeError> {
    let stmt = client.prepare(query).await.map_err(SqlScopeError::prepare)?;
    let params = Params::convert(values);
    match kind {
        StatementKind::Read => {
            let rows = client.query(&stmt, params.as_refs()).await?;
            build_result_set_from_statement(&stmt, &rows)
        }
        StatementKind::Mutation => {
            let affected = client.execute(&stmt, params.as_refs()).await?;
            Ok(ResultSet::execution_summary(affected, 0))
        }
    }
}

/// Prepare `query` once and execute it for every mapping in `batch`, in order.
///
/// # Errors
/// Returns the first preparation, binding, or execution error.
pub async fn execute_bulk(
    client: &Object,
    query: &str,
    names: &[String],
    batch: &[NamedParams],
) -> Result<ResultSet, SqlScopeError> {
    let stmt = client.prepare(query).await.map_err(SqlScopeError::prepare)?;
    let mut affected = 0_u64;
    for named in batch {
        let values = bind_params(named, names)?;
        let params = Params::convert(&values);
        affected += client.execute(&stmt, params.as_refs()).await?;
    }
    Ok(ResultSet::execution_summary(affected, 0))
}

/// Run parameterless SQL, possibly several `;`-separated statements (`BEGIN`, DDL, ...).
///
/// # Errors
/// Returns the driver error raised by the first failing statement.
pub async fn execute_batch(client: &Object, sql: &str) -> Result<(), SqlScopeError> {
    client.batch_execute(sql).await?;
    Ok(())
}

/// # Errors
/// Returns the driver error if the round trip fails.
pub async fn ping(client: &Object) -> Result<(), SqlScopeError> {
    client.simple_query("SELECT 1").await?;
    Ok(())
}
