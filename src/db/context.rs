//! Scope carriers.
//!
//! A [`Context`] is the request-scoped value a caller threads through its call
//! chain. It carries at most one transaction handle and at most one batch
//! accumulator. Attaching never mutates a context in place: it derives a new one,
//! so nested scopes shadow their parent for their own lineage only. Derived
//! contexts share the underlying handles.

use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Statement};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{MappedMutexGuard, Mutex as AsyncMutex, MutexGuard};

/// Request-scoped carrier of the active transaction and batch.
pub struct Context<T> {
    tx: Option<TxHandle<T>>,
    batch: Option<BatchAccumulator>,
}

impl<T> Context<T> {
    /// A context with no scope attached. Statements resolve to the pool.
    pub fn new() -> Self {
        Self {
            tx: None,
            batch: None,
        }
    }

    /// Derive a context carrying `tx`, shadowing any transaction already attached.
    pub fn with_transaction(&self, tx: TxHandle<T>) -> Self {
        Self {
            tx: Some(tx),
            batch: self.batch.clone(),
        }
    }

    /// Derive a context carrying `batch`, shadowing any batch already attached.
    pub fn with_batch(&self, batch: BatchAccumulator) -> Self {
        Self {
            tx: self.tx.clone(),
            batch: Some(batch),
        }
    }

    pub fn transaction(&self) -> Option<&TxHandle<T>> {
        self.tx.as_ref()
    }

    pub fn batch(&self) -> Option<&BatchAccumulator> {
        self.batch.as_ref()
    }
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            batch: self.batch.clone(),
        }
    }
}

impl<T> Default for Context<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("transaction", &self.tx.as_ref().map(TxHandle::id))
            .field("batch_len", &self.batch.as_ref().map(BatchAccumulator::len))
            .finish()
    }
}

/// Shared handle to an open transaction.
///
/// Commit and rollback take the transaction out of the handle; afterwards the
/// handle is finished and every clone of it observes that.
pub struct TxHandle<T> {
    id: Arc<str>,
    inner: Arc<AsyncMutex<Option<T>>>,
}

impl<T> TxHandle<T> {
    /// Wrap a freshly opened transaction under a new identifier.
    pub fn new(tx: T) -> Self {
        Self {
            id: generate_transaction_id().into(),
            inner: Arc::new(AsyncMutex::new(Some(tx))),
        }
    }

    /// Identifier used in logs and transaction errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether commit or rollback already consumed the transaction.
    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.is_none()
    }

    /// Lock the transaction for statement execution.
    pub(crate) async fn lock(&self) -> DbResult<MappedMutexGuard<'_, T>> {
        let guard = self.inner.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            DbError::transaction("Transaction is no longer active", self.id())
        })
    }

    /// Lock the slot itself; used by commit/rollback to take the transaction.
    pub(crate) async fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.inner.lock().await
    }
}

impl<T> Clone for TxHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TxHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle").field("id", &self.id).finish()
    }
}

/// Ordered queue of deferred statements.
///
/// Clones share the same queue. Its length is the number of results the batch
/// will produce when it is sent.
#[derive(Clone, Default)]
pub struct BatchAccumulator {
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement; its position is its execution order.
    pub fn queue(&self, sql: &str, params: &[QueryParam]) {
        self.push(Statement::with_params(sql, params));
    }

    pub fn push(&self, statement: Statement) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued statements, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for BatchAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchAccumulator")
            .field("len", &self.len())
            .finish()
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
