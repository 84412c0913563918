use async_trait::async_trait;
use tracing::trace;

use crate::context::ExecContext;
use crate::error::SqlScopeError;
use crate::params::{NamedParams, bind_params};
use crate::pool::ConfigAndPool;
use crate::results::ResultSet;
use crate::translation::StatementKind;

impl ConfigAndPool {
    /// Translate, bind, and run one statement.
    ///
    /// Reads return their rows. Everything else returns the execution summary
    /// (`affected_rows`, `last_insert_id`). The statement runs inside the context's transaction
    /// when there is one, otherwise on a connection checked out for this call.
    ///
    /// # Errors
    /// - `MissingParameter` if `params` lacks a name used in `query` (nothing reaches the backend);
    /// - `PrepareError` if the backend rejects the statement;
    /// - `RollbackOnly` if the context's transaction is doomed;
    /// - `DeadlineExceeded` if the context's deadline passes first;
    /// - the backend's execution error otherwise.
    pub async fn query(
        &self,
        ctx: &ExecContext,
        query: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlScopeError> {
        let translated = self.translator().translate(query);
        let values = bind_params(params, &translated.names)?;
        let kind = StatementKind::classify(&translated.sql);
        trace!(sql = %translated.sql, ?kind, params = values.len(), "query");

        match ctx.transaction() {
            Some(tx) => {
                self.ensure_same_pool(tx)?;
                ctx.bounded("executing a statement", async {
                    let conn = tx.connection().await?;
                    conn.run_statement(&translated.sql, &values, kind).await
                })
                .await
            }
            None => {
                ctx.bounded("executing a statement", async {
                    let conn = self.get_connection().await?;
                    conn.run_statement(&translated.sql, &values, kind).await
                })
                .await
            }
        }
    }

    /// Run one write statement once per parameter mapping, preparing it only once.
    ///
    /// The summary holds the sum of affected rows and the last execution's generated id. An
    /// empty batch returns a zero summary. Iterations that already ran are not undone when a
    /// later one fails, unless the whole call ran in a transaction that rolls back.
    ///
    /// # Errors
    /// - `OperationNotPermitted` for a `select` statement, whatever the parameters;
    /// - `MissingParameter` from the first mapping that lacks a name;
    /// - the same backend, transaction, and deadline errors as [`ConfigAndPool::query`].
    pub async fn query_bulk(
        &self,
        ctx: &ExecContext,
        query: &str,
        batch: &[NamedParams],
    ) -> Result<ResultSet, SqlScopeError> {
        if StatementKind::classify(query) == StatementKind::Read {
            return Err(SqlScopeError::OperationNotPermitted(
                "select statements cannot be run in bulk".to_string(),
            ));
        }
        let translated = self.translator().translate(query);
        trace!(sql = %translated.sql, iterations = batch.len(), "bulk query");

        match ctx.transaction() {
            Some(tx) => {
                self.ensure_same_pool(tx)?;
                ctx.bounded("executing a bulk statement", async {
                    let conn = tx.connection().await?;
                    conn.run_bulk(&translated.sql, &translated.names, batch).await
                })
                .await
            }
            None => {
                ctx.bounded("executing a bulk statement", async {
                    let conn = self.get_connection().await?;
                    conn.run_bulk(&translated.sql, &translated.names, batch).await
                })
                .await
            }
        }
    }

    /// Run parameterless SQL text as-is, e.g. a schema script of several statements.
    ///
    /// # Errors
    /// Returns the backend error of the first failing statement, or the transaction and deadline
    /// errors of [`ConfigAndPool::query`].
    pub async fn execute_batch(&self, ctx: &ExecContext, sql: &str) -> Result<(), SqlScopeError> {
        trace!(sql, "batch");
        match ctx.transaction() {
            Some(tx) => {
                self.ensure_same_pool(tx)?;
                ctx.bounded("executing a batch", async {
                    let conn = tx.connection().await?;
                    conn.run_batch(sql).await
                })
                .await
            }
            None => {
                ctx.bounded("executing a batch", async {
                    let conn = self.get_connection().await?;
                    conn.run_batch(sql).await
                })
                .await
            }
        }
    }
}

/// Statement execution surface shared by anything that can run named-parameter SQL.
#[async_trait]
pub trait AsyncDatabaseExecutor {
    /// Executes a single statement and returns rows for reads or a summary for writes.
    async fn query(
        &self,
        ctx: &ExecContext,
        query: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlScopeError>;

    /// Executes one write statement per parameter mapping.
    async fn query_bulk(
        &self,
        ctx: &ExecContext,
        query: &str,
        batch: &[NamedParams],
    ) -> Result<ResultSet, SqlScopeError>;

    /// Executes parameterless SQL, possibly several statements.
    async fn execute_batch(&self, ctx: &ExecContext, sql: &str) -> Result<(), SqlScopeError>;
}

#[async_trait]
impl AsyncDatabaseExecutor for ConfigAndPool {
    async fn query(
        &self,
        ctx: &ExecContext,
        query: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlScopeError> {
        ConfigAndPool::query(self, ctx, query, params).await
    }

    async fn query_bulk(
        &self,
        ctx: &ExecContext,
        query: &str,
        batch: &[NamedParams],
    ) -> Result<ResultSet, SqlScopeError> {
        ConfigAndPool::query_bulk(self, ctx, query, batch).await
    }

    async fn execute_batch(&self, ctx: &ExecContext, sql: &str) -> Result<(), SqlScopeError> {
        ConfigAndPool::execute_batch(self, ctx, sql).await
    }
}
