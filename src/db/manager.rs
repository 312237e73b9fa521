//! Executor resolution.
//!
//! The [`Manager`] owns a handle to the shared store and decides, per context,
//! which executor applies. Precedence is batch, then transaction, then pool.
//! Resolution never fails: a context with no scope simply falls through to the
//! pool.

use crate::db::context::{BatchAccumulator, Context, TxHandle};
use crate::db::executor::{BatchExecutor, Executor, PoolExecutor, TxExecutor};
use crate::db::store::Store;
use crate::error::DbResult;
use tracing::debug;

/// Context type for a given store.
pub type StoreContext<S> = Context<<S as Store>::Tx>;

#[derive(Debug, Clone)]
pub struct Manager<S> {
    store: S,
}

impl<S: Store> Manager<S> {
    /// Create a manager over the shared store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The shared store used for pool resolution.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open a transaction on the store and wrap it in a fresh handle.
    pub async fn begin(&self) -> DbResult<TxHandle<S::Tx>> {
        let tx = self.store.begin().await?;
        Ok(TxHandle::new(tx))
    }

    /// Pick the executor for `ctx`.
    pub fn resolve(&self, ctx: &StoreContext<S>) -> Executor<S> {
        if let Some(batch) = self.extract_batch(ctx) {
            debug!(queued = batch.len(), "Resolved batch executor");
            return Executor::Batch(BatchExecutor::new(batch.clone()));
        }

        if let Some(tx) = self.extract_transaction(ctx) {
            debug!(transaction_id = %tx.id(), "Resolved transaction executor");
            return Executor::Transaction(TxExecutor::new(tx.clone()));
        }

        Executor::Pool(PoolExecutor::new(self.store.clone()))
    }

    /// Derive a context carrying `tx`.
    pub fn attach_transaction(
        &self,
        ctx: &StoreContext<S>,
        tx: TxHandle<S::Tx>,
    ) -> StoreContext<S> {
        ctx.with_transaction(tx)
    }

    /// Derive a context carrying `batch`.
    pub fn attach_batch(&self, ctx: &StoreContext<S>, batch: BatchAccumulator) -> StoreContext<S> {
        ctx.with_batch(batch)
    }

    pub fn extract_transaction<'a>(
        &self,
        ctx: &'a StoreContext<S>,
    ) -> Option<&'a TxHandle<S::Tx>> {
        ctx.transaction()
    }

    pub fn extract_batch<'a>(&self, ctx: &'a StoreContext<S>) -> Option<&'a BatchAccumulator> {
        ctx.batch()
    }

    /// A fresh, empty batch accumulator.
    pub fn new_batch(&self) -> BatchAccumulator {
        BatchAccumulator::new()
    }
}
