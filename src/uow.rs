//! Unit of work.
//!
//! This module provides the begin/commit/rollback lifecycle on top of the
//! [`Manager`]. A unit of work starts by deriving a context that carries a
//! transaction (and optionally a batch accumulator); statements issued through
//! `Manager::resolve` on that context are routed accordingly; commit then
//! reconciles the batch against the transaction before committing it.
//!
//! # Cleanup
//!
//! [`UnitOfWork::with_graceful_rollback`] is the scoped epilogue for a unit of
//! work. Whatever way the wrapped future ends, it is handled:
//!
//! - unwinding: best-effort rollback, then the original panic resumes
//! - `Err`: best-effort rollback, the original error is returned untouched
//! - `Ok`: nothing
//!
//! [`UnitOfWork::run`] strings begin, body, commit and that epilogue together.

use crate::db::manager::{Manager, StoreContext};
use crate::db::store::{BatchResults, Queryable, Store, Transaction};
use crate::db::Executor;
use crate::error::{DbError, DbResult};
use crate::models::Statement;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

const OP_BEGIN: &str = "uow.begin_with_transaction";
const OP_BEGIN_BATCH: &str = "uow.begin_with_transaction_and_batch";
const OP_COMMIT: &str = "uow.commit";
const OP_ROLLBACK: &str = "uow.rollback";

/// How a unit of work routes its statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeginMode {
    /// Statements run immediately inside the transaction.
    #[default]
    Transaction,
    /// Statements are queued and sent as one batch at commit.
    TransactionAndBatch,
}

#[derive(Debug, Clone)]
pub struct UnitOfWork<S> {
    manager: Manager<S>,
}

impl<S: Store> UnitOfWork<S> {
    pub fn new(manager: Manager<S>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Manager<S> {
        &self.manager
    }

    /// Shorthand for `manager().resolve(ctx)`.
    pub fn executor(&self, ctx: &StoreContext<S>) -> Executor<S> {
        self.manager.resolve(ctx)
    }

    /// Open a transaction and derive a context carrying it.
    ///
    /// On failure `ctx` is left as it was and the error is `TxStartFailed`.
    pub async fn begin_with_transaction(
        &self,
        ctx: &StoreContext<S>,
    ) -> DbResult<StoreContext<S>> {
        let tx = self
            .manager
            .begin()
            .await
            .map_err(|e| DbError::tx_start_failed(OP_BEGIN, e))?;

        info!(transaction_id = %tx.id(), "Transaction started");

        Ok(self.manager.attach_transaction(ctx, tx))
    }

    /// Open a transaction and derive a context carrying it plus a fresh batch.
    pub async fn begin_with_transaction_and_batch(
        &self,
        ctx: &StoreContext<S>,
    ) -> DbResult<StoreContext<S>> {
        let tx = self
            .manager
            .begin()
            .await
            .map_err(|e| DbError::tx_start_failed(OP_BEGIN_BATCH, e))?;
        let batch = self.manager.new_batch();

        info!(transaction_id = %tx.id(), "Transaction started with batch");

        let ctx = self.manager.attach_transaction(ctx, tx);
        Ok(self.manager.attach_batch(&ctx, batch))
    }

    pub async fn begin(&self, ctx: &StoreContext<S>, mode: BeginMode) -> DbResult<StoreContext<S>> {
        match mode {
            BeginMode::Transaction => self.begin_with_transaction(ctx).await,
            BeginMode::TransactionAndBatch => self.begin_with_transaction_and_batch(ctx).await,
        }
    }

    /// Reconcile any queued batch, then commit the transaction.
    ///
    /// If the batch fails, the transaction is not committed and stays open for
    /// the caller to roll back.
    pub async fn commit(&self, ctx: &StoreContext<S>) -> DbResult<()> {
        let Some(handle) = self.manager.extract_transaction(ctx) else {
            return Err(DbError::NoTransactionToCommit { op: OP_COMMIT });
        };

        let mut slot = handle.slot().await;
        let Some(tx) = slot.as_mut() else {
            return Err(DbError::NoTransactionToCommit { op: OP_COMMIT });
        };

        if let Some(batch) = self.manager.extract_batch(ctx) {
            let statements = batch.statements();
            if statements.is_empty() {
                debug!(transaction_id = %handle.id(), "Batch empty; skipping send");
            } else {
                reconcile_batch(tx, &statements).await?;
                debug!(
                    transaction_id = %handle.id(),
                    statements = statements.len(),
                    "Batch reconciled"
                );
            }
        }

        let Some(tx) = slot.take() else {
            return Err(DbError::NoTransactionToCommit { op: OP_COMMIT });
        };
        tx.commit()
            .await
            .map_err(|e| DbError::commit_failed(OP_COMMIT, e))?;

        info!(transaction_id = %handle.id(), "Transaction committed");
        Ok(())
    }

    /// Roll back the transaction attached to `ctx`.
    pub async fn rollback(&self, ctx: &StoreContext<S>) -> DbResult<()> {
        let Some(handle) = self.manager.extract_transaction(ctx) else {
            return Err(DbError::NoTransactionToRollback { op: OP_ROLLBACK });
        };

        let Some(tx) = handle.slot().await.take() else {
            return Err(DbError::NoTransactionToRollback { op: OP_ROLLBACK });
        };
        tx.rollback()
            .await
            .map_err(|e| DbError::rollback_failed(OP_ROLLBACK, e))?;

        info!(transaction_id = %handle.id(), "Transaction rolled back");
        Ok(())
    }

    /// Best-effort rollback when `outcome` is an error; no-op on success.
    ///
    /// The rollback's own error is logged and dropped: `outcome` already tells
    /// the caller the unit of work failed.
    pub async fn graceful_rollback<T, E>(&self, ctx: &StoreContext<S>, outcome: &Result<T, E>) {
        if outcome.is_err() {
            self.rollback_quietly(ctx).await;
        }
    }

    /// Run `work` with rollback cleanup on every failing exit path.
    pub async fn with_graceful_rollback<F, T, E>(&self, ctx: &StoreContext<S>, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => {
                self.graceful_rollback(ctx, &outcome).await;
                outcome
            }
            Err(payload) => {
                warn!("Panic inside unit of work; rolling back before resuming");
                self.rollback_quietly(ctx).await;
                panic::resume_unwind(payload)
            }
        }
    }

    /// Begin, run `body` on the derived context, then commit.
    ///
    /// Any failure (including a failed commit) rolls back; a panic in `body`
    /// rolls back and keeps unwinding.
    pub async fn run<F, Fut, T, E>(&self, ctx: &StoreContext<S>, mode: BeginMode, body: F) -> Result<T, E>
    where
        F: FnOnce(StoreContext<S>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let scoped = self.begin(ctx, mode).await?;

        let work = async {
            let value = body(scoped.clone()).await?;
            self.commit(&scoped).await?;
            Ok::<T, E>(value)
        };

        self.with_graceful_rollback(&scoped, work).await
    }

    async fn rollback_quietly(&self, ctx: &StoreContext<S>) {
        if let Err(e) = self.rollback(ctx).await {
            warn!(error = %e, "Best-effort rollback failed; error discarded");
        }
    }
}

/// Send `statements` through `tx` and drain exactly one result per statement.
///
/// The stream is always closed. A statement failure wins over a close failure.
async fn reconcile_batch<T: Transaction>(tx: &mut T, statements: &[Statement]) -> DbResult<()> {
    let mut results = tx.send_batch(statements).await;

    let mut drained = Ok(());
    for index in 0..statements.len() {
        if let Err(e) = results.next().await {
            drained = Err(DbError::exec_batch_failed(OP_COMMIT, index, e));
            break;
        }
    }

    let closed = results.close().await;

    match (drained, closed) {
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Batch close failed after statement failure");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(close_err)) => Err(DbError::batch_close_failed(OP_COMMIT, close_err)),
        (Ok(()), Ok(())) => Ok(()),
    }
}
