//! Transaction handles and the owner/participant propagator behind `wrap`.
//!
//! The first `wrap` in a call chain begins a transaction and owns it: it commits when its unit
//! of work succeeds and rolls back when it fails. Any `wrap` reached through a context that
//! already carries a handle joins that transaction instead and never finalizes it. A joined
//! unit that fails marks the handle rollback-only, so the owner cannot commit partial work even
//! if an intermediate frame swallowed the failure.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use serde::Deserialize;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::context::ExecContext;
use crate::error::SqlScopeError;
use crate::pool::{ConfigAndPool, MiddlewarePoolConnection};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

impl TxState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TxState::Committed,
            2 => TxState::RolledBack,
            _ => TxState::Active,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TxState::Active => 0,
            TxState::Committed => 1,
            TxState::RolledBack => 2,
        }
    }
}

/// What an owning `wrap` does with commit and rollback outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalizePolicy {
    /// Return a failed commit, or `TransactionRolledBack` when a joined unit failed, to the caller.
    #[default]
    Strict,
    /// Log finalize outcomes and return the unit of work's own value.
    Lenient,
}

/// Role a `wrap` invocation plays for the transaction it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRole {
    Owner,
    Participant,
}

impl fmt::Display for TxRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxRole::Owner => f.write_str("owner"),
            TxRole::Participant => f.write_str("participant"),
        }
    }
}

struct TxInner {
    id: u64,
    pool_id: u64,
    // `None` once the transaction is finalized and the connection is back in the pool.
    conn: Mutex<Option<MiddlewarePoolConnection>>,
    state: AtomicU8,
    rollback_only: AtomicBool,
}

/// Shared handle to one open database transaction.
///
/// Clones refer to the same transaction. The handle owns the pooled connection until commit or
/// rollback, and statements issued through it are serialized.
#[derive(Clone)]
pub struct TxHandle(Arc<TxInner>);

impl TxHandle {
    fn new(pool_id: u64, conn: MiddlewarePoolConnection) -> Self {
        Self(Arc::new(TxInner {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            pool_id,
            conn: Mutex::new(Some(conn)),
            state: AtomicU8::new(TxState::Active.as_u8()),
            rollback_only: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Identifier of the pool that began this transaction.
    #[must_use]
    pub fn pool_id(&self) -> u64 {
        self.0.pool_id
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        TxState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state() != TxState::Active
    }

    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        self.0.rollback_only.load(Ordering::Acquire)
    }

    /// Doom the transaction: later statements fail and the owner will roll back.
    pub fn mark_rollback_only(&self) {
        if !self.0.rollback_only.swap(true, Ordering::AcqRel) {
            debug!(tx_id = self.id(), "transaction marked rollback-only");
        }
    }

    fn set_state(&self, state: TxState) {
        self.0.state.store(state.as_u8(), Ordering::Release);
    }

    fn finalized_error(&self) -> SqlScopeError {
        SqlScopeError::TransactionError(format!(
            "transaction {} is already {}",
            self.id(),
            match self.state() {
                TxState::Committed => "committed",
                _ => "rolled back",
            }
        ))
    }

    /// Lock the transaction's connection for one statement.
    pub(crate) async fn connection(
        &self,
    ) -> Result<MappedMutexGuard<'_, MiddlewarePoolConnection>, SqlScopeError> {
        let slot = self.0.conn.lock().await;
        if self.is_rollback_only() {
            return Err(SqlScopeError::RollbackOnly(self.id()));
        }
        MutexGuard::try_map(slot, Option::as_mut).map_err(|_| self.finalized_error())
    }

    /// Commit and release the connection.
    ///
    /// A rollback-only handle is rolled back instead and reported as
    /// [`SqlScopeError::TransactionRolledBack`]. If `COMMIT` itself fails, a rollback is
    /// attempted before the commit error is returned.
    ///
    /// # Errors
    /// Returns `TransactionError` if the handle is already finalized.
    pub async fn commit(&self) -> Result<(), SqlScopeError> {
        let mut slot = self.0.conn.lock().await;
        let Some(conn) = slot.take() else {
            return Err(self.finalized_error());
        };

        if self.is_rollback_only() {
            if let Err(err) = conn.rollback().await {
                warn!(tx_id = self.id(), error = %err, "rollback of rollback-only transaction failed");
            }
            self.set_state(TxState::RolledBack);
            debug!(tx_id = self.id(), "rolled back instead of committing");
            return Err(SqlScopeError::TransactionRolledBack(self.id()));
        }

        match conn.commit().await {
            Ok(()) => {
                self.set_state(TxState::Committed);
                debug!(tx_id = self.id(), "transaction committed");
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = conn.rollback().await {
                    warn!(tx_id = self.id(), error = %rb, "rollback after failed commit failed");
                }
                self.set_state(TxState::RolledBack);
                Err(err)
            }
        }
    }

    /// Roll back and release the connection.
    ///
    /// # Errors
    /// Returns `TransactionError` if the handle is already finalized, or the backend error.
    /// The handle counts as rolled back either way.
    pub async fn rollback(&self) -> Result<(), SqlScopeError> {
        let mut slot = self.0.conn.lock().await;
        let Some(conn) = slot.take() else {
            return Err(self.finalized_error());
        };
        let outcome = conn.rollback().await;
        self.set_state(TxState::RolledBack);
        debug!(tx_id = self.id(), ok = outcome.is_ok(), "transaction rolled back");
        outcome
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("id", &self.id())
            .field("pool_id", &self.pool_id())
            .field("state", &self.state())
            .field("rollback_only", &self.is_rollback_only())
            .finish()
    }
}

impl Drop for TxInner {
    fn drop(&mut self) {
        let Some(conn) = self.conn.get_mut().take() else {
            return;
        };
        let tx_id = self.id;
        warn!(tx_id, "transaction dropped while active; rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = conn.rollback().await {
                        warn!(tx_id, error = %err, "rollback of dropped transaction failed");
                    }
                });
            }
            Err(_) => conn.discard(),
        }
    }
}

impl ConfigAndPool {
    /// Check out a connection and issue `BEGIN` on it.
    ///
    /// # Errors
    /// Returns the checkout error or the backend's `BEGIN` error.
    pub async fn begin_transaction(&self) -> Result<TxHandle, SqlScopeError> {
        let conn = self.get_connection().await?;
        self.begin_on(conn).await
    }

    /// Issue `BEGIN` on a connection that is already checked out.
    async fn begin_on(&self, conn: MiddlewarePoolConnection) -> Result<TxHandle, SqlScopeError> {
        conn.begin().await?;
        let tx = TxHandle::new(self.pool_id(), conn);
        debug!(tx_id = tx.id(), pool_id = self.pool_id(), "transaction begun");
        Ok(tx)
    }

    pub(crate) fn ensure_same_pool(&self, tx: &TxHandle) -> Result<(), SqlScopeError> {
        if tx.pool_id() == self.pool_id() {
            Ok(())
        } else {
            Err(SqlScopeError::OperationNotPermitted(format!(
                "transaction {} belongs to pool {}, not pool {}",
                tx.id(),
                tx.pool_id(),
                self.pool_id()
            )))
        }
    }

    /// Run `unit` inside a transaction; see [`TxAdapter::wrap`].
    ///
    /// # Errors
    /// Returns the unit's own error, or a begin/finalize error as described on `TxAdapter::wrap`.
    pub async fn wrap<F, Fut, T, E>(&self, ctx: &ExecContext, unit: F) -> Result<T, E>
    where
        F: FnOnce(ExecContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SqlScopeError>,
    {
        TxAdapter::new(self.clone()).wrap(ctx, unit).await
    }
}

/// Runs units of work in a transaction, joining the one already carried by the context if any.
#[derive(Debug, Clone)]
pub struct TxAdapter {
    cap: ConfigAndPool,
}

impl TxAdapter {
    #[must_use]
    pub fn new(cap: ConfigAndPool) -> Self {
        Self { cap }
    }

    #[must_use]
    pub fn pool(&self) -> &ConfigAndPool {
        &self.cap
    }

    /// Run `unit` in a transaction.
    ///
    /// Without a transaction in `ctx` this call owns a new one: `unit` receives a context
    /// carrying it, and the transaction is committed if `unit` succeeds or rolled back if it
    /// fails. With a transaction in `ctx` this call participates: `unit` receives `ctx`
    /// unchanged and nothing is finalized here.
    ///
    /// # Errors
    /// - the unit's error, always, whatever the role;
    /// - `DeadlineExceeded` if no connection is checked out before the deadline, or the
    ///   backend error if `BEGIN` fails;
    /// - `OperationNotPermitted` if `ctx` carries a transaction from another pool;
    /// - `TransactionError` if `ctx` carries a transaction that is already finalized;
    /// - under [`FinalizePolicy::Strict`], the commit error, or `TransactionRolledBack` when a
    ///   participant failed but the owner's unit still succeeded.
    pub async fn wrap<F, Fut, T, E>(&self, ctx: &ExecContext, unit: F) -> Result<T, E>
    where
        F: FnOnce(ExecContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SqlScopeError>,
    {
        if let Some(tx) = ctx.transaction() {
            self.cap.ensure_same_pool(tx)?;
            if tx.is_finalized() {
                return Err(tx.finalized_error().into());
            }
            let tx = tx.clone();
            debug!(tx_id = tx.id(), role = %TxRole::Participant, "joining transaction");
            let result = unit(ctx.clone()).await;
            if result.is_err() {
                tx.mark_rollback_only();
            }
            return result;
        }

        // only the checkout is bounded; BEGIN is never cancelled mid-flight
        let conn = ctx
            .bounded("checking out a connection", self.cap.get_connection())
            .await?;
        let tx = self.cap.begin_on(conn).await?;
        debug!(tx_id = tx.id(), role = %TxRole::Owner, "owning transaction");
        let result = unit(ctx.with_transaction(tx.clone())).await;
        self.resolve(&tx, result).await
    }

    async fn resolve<T, E>(&self, tx: &TxHandle, result: Result<T, E>) -> Result<T, E>
    where
        E: From<SqlScopeError>,
    {
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(tx_id = tx.id(), error = %rb, "rollback after failed unit of work failed");
                }
                return Err(err);
            }
        };

        match tx.commit().await {
            Ok(()) => Ok(value),
            Err(err) => match self.cap.finalize_policy() {
                FinalizePolicy::Strict => Err(err.into()),
                FinalizePolicy::Lenient => {
                    warn!(tx_id = tx.id(), error = %err, "commit outcome discarded");
                    Ok(value)
                }
            },
        }
    }
}
