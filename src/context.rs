//! Call-scoped carrier for the ambient transaction and deadline.
//!
//! An [`ExecContext`] is never changed in place. Each `with_*` call returns a new context that
//! points at its parent, so a context handed to a child call cannot be altered by anything the
//! child does, and concurrent tasks can share one freely.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SqlScopeError;
use crate::transaction::TxHandle;

#[derive(Clone)]
pub struct ExecContext {
    node: Arc<Node>,
}

struct Node {
    parent: Option<Arc<Node>>,
    binding: Binding,
}

enum Binding {
    Root,
    Transaction(TxHandle),
    Deadline(Instant),
    Value {
        key: &'static str,
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecContext {
    /// A fresh top-level context with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node {
                parent: None,
                binding: Binding::Root,
            }),
        }
    }

    fn derive(&self, binding: Binding) -> Self {
        Self {
            node: Arc::new(Node {
                parent: Some(Arc::clone(&self.node)),
                binding,
            }),
        }
    }

    /// Derive a context whose statements run inside `tx`.
    #[must_use]
    pub fn with_transaction(&self, tx: TxHandle) -> Self {
        self.derive(Binding::Transaction(tx))
    }

    /// Derive a context whose backend calls must finish before `deadline`.
    ///
    /// A deadline can only be tightened: the earliest one in the chain applies.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Binding::Deadline(deadline))
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context carrying an application value under `key`.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(&self, key: &'static str, value: T) -> Self {
        self.derive(Binding::Value {
            key,
            value: Arc::new(value),
        })
    }

    /// The transaction bound closest to this context, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&TxHandle> {
        self.bindings().find_map(|binding| match binding {
            Binding::Transaction(tx) => Some(tx),
            _ => None,
        })
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.bindings()
            .filter_map(|binding| match binding {
                Binding::Deadline(at) => Some(*at),
                _ => None,
            })
            .min()
    }

    /// The newest value stored under `key`, if it has type `T`.
    #[must_use]
    pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
        self.bindings().find_map(|binding| match binding {
            Binding::Value { key: k, value } if *k == key => value.downcast_ref::<T>(),
            _ => None,
        })
    }

    fn bindings(&self) -> impl Iterator<Item = &Binding> {
        let mut next: Option<&Node> = Some(&self.node);
        std::iter::from_fn(move || {
            let node = next?;
            next = node.parent.as_deref();
            Some(&node.binding)
        })
    }

    /// Run a backend call, failing with [`SqlScopeError::DeadlineExceeded`] if the context's
    /// deadline passes first.
    ///
    /// A deadline that has already passed fails without polling `fut` at all.
    pub(crate) async fn bounded<F, T>(&self, action: &str, fut: F) -> Result<T, SqlScopeError>
    where
        F: Future<Output = Result<T, SqlScopeError>>,
    {
        let Some(deadline) = self.deadline() else {
            return fut.await;
        };
        if Instant::now() >= deadline {
            return Err(SqlScopeError::DeadlineExceeded(action.to_string()));
        }
        tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| SqlScopeError::DeadlineExceeded(action.to_string()))?
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("transaction", &self.transaction().map(TxHandle::id))
            .field("deadline", &self.deadline())
            .finish_non_exhaustive()
    }
}
