//! Resolved executors.
//!
//! An [`Executor`] is what a call site gets back from `Manager::resolve`. It is
//! selected once from the context and then reused for the rest of the call chain:
//!
//! - `Pool`: forwards every operation verbatim to the shared store
//! - `Transaction`: forwards to the transaction attached to the context
//! - `Batch`: queues statements instead of running them
//!
//! All three expose the same operations through [`Queryable`], so call sites do
//! not need to know which one they hold.

use crate::db::context::{BatchAccumulator, TxHandle};
use crate::db::store::{BatchResults, Queryable, Store};
use crate::error::{DbError, DbResult};
use crate::models::{CommandResult, CopyTarget, QueryParam, Row, RowSet, Statement};
use std::fmt;
use tracing::debug;

/// Which execution strategy an [`Executor`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Pool,
    Transaction,
    Batch,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool => write!(f, "pool"),
            Self::Transaction => write!(f, "transaction"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// Executor resolved from a context.
pub enum Executor<S: Store> {
    Pool(PoolExecutor<S>),
    Transaction(TxExecutor<S::Tx>),
    Batch(BatchExecutor),
}

impl<S: Store> Executor<S> {
    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Pool(_) => ExecutorKind::Pool,
            Self::Transaction(_) => ExecutorKind::Transaction,
            Self::Batch(_) => ExecutorKind::Batch,
        }
    }
}

impl<S: Store> fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool(_) => f.write_str("Executor::Pool"),
            Self::Transaction(tx) => write!(f, "Executor::Transaction({})", tx.handle.id()),
            Self::Batch(batch) => write!(f, "Executor::Batch(len={})", batch.len()),
        }
    }
}

impl<S: Store> Queryable for Executor<S> {
    type Results = ExecutorResults<S::Results>;

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<CommandResult> {
        match self {
            Self::Pool(e) => e.execute(sql, params).await,
            Self::Transaction(e) => e.execute(sql, params).await,
            Self::Batch(e) => e.execute(sql, params).await,
        }
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<RowSet> {
        match self {
            Self::Pool(e) => e.query(sql, params).await,
            Self::Transaction(e) => e.query(sql, params).await,
            Self::Batch(e) => e.query(sql, params).await,
        }
    }

    async fn query_one(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        match self {
            Self::Pool(e) => e.query_one(sql, params).await,
            Self::Transaction(e) => e.query_one(sql, params).await,
            Self::Batch(e) => e.query_one(sql, params).await,
        }
    }

    async fn send_batch(&mut self, statements: &[Statement]) -> Self::Results {
        match self {
            Self::Pool(e) => e.send_batch(statements).await,
            Self::Transaction(e) => e.send_batch(statements).await,
            Self::Batch(e) => e.send_batch(statements).await,
        }
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        match self {
            Self::Pool(e) => e.copy_in(target, columns, rows).await,
            Self::Transaction(e) => e.copy_in(target, columns, rows).await,
            Self::Batch(e) => e.copy_in(target, columns, rows).await,
        }
    }
}

/// Batch results as seen through a resolved executor.
///
/// `Empty` is what a batch executor hands back when asked to send a batch: there
/// is nothing to drain.
pub enum ExecutorResults<R> {
    Store(R),
    Empty,
}

impl<R: BatchResults> BatchResults for ExecutorResults<R> {
    async fn next(&mut self) -> DbResult<CommandResult> {
        match self {
            Self::Store(results) => results.next().await,
            Self::Empty => Err(DbError::internal("batch result stream exhausted")),
        }
    }

    async fn close(self) -> DbResult<()> {
        match self {
            Self::Store(results) => results.close().await,
            Self::Empty => Ok(()),
        }
    }
}

/// Passthrough to the shared store.
pub struct PoolExecutor<S> {
    pool: S,
}

impl<S: Store> PoolExecutor<S> {
    pub fn new(pool: S) -> Self {
        Self { pool }
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<CommandResult> {
        self.pool.execute(sql, params).await
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<RowSet> {
        self.pool.query(sql, params).await
    }

    async fn query_one(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        self.pool.query_one(sql, params).await
    }

    async fn send_batch(&mut self, statements: &[Statement]) -> ExecutorResults<S::Results> {
        ExecutorResults::Store(self.pool.send_batch(statements).await)
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        self.pool.copy_in(target, columns, rows).await
    }
}

/// Executes against the transaction attached to the context.
pub struct TxExecutor<T> {
    handle: TxHandle<T>,
}

impl<T: Queryable> TxExecutor<T> {
    pub fn new(handle: TxHandle<T>) -> Self {
        Self { handle }
    }

    pub fn transaction_id(&self) -> &str {
        self.handle.id()
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<CommandResult> {
        let mut tx = self.handle.lock().await?;
        tx.execute(sql, params).await
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<RowSet> {
        let mut tx = self.handle.lock().await?;
        tx.query(sql, params).await
    }

    async fn query_one(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        let mut tx = self.handle.lock().await?;
        tx.query_one(sql, params).await
    }

    /// A finished transaction yields an empty stream: draining it reports
    /// exhaustion rather than touching the store.
    async fn send_batch(&mut self, statements: &[Statement]) -> ExecutorResults<T::Results> {
        match self.handle.lock().await {
            Ok(mut tx) => ExecutorResults::Store(tx.send_batch(statements).await),
            Err(_) => ExecutorResults::Empty,
        }
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        let mut tx = self.handle.lock().await?;
        tx.copy_in(target, columns, rows).await
    }
}

/// Captures statements into the batch accumulator instead of running them.
///
/// Immediate results are empty; real results only exist once the batch is sent
/// at commit.
pub struct BatchExecutor {
    batch: BatchAccumulator,
}

impl BatchExecutor {
    const COPY_OP: &'static str = "executor.batch.copy_in";

    pub fn new(batch: BatchAccumulator) -> Self {
        Self { batch }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    fn enqueue(&self, sql: &str, params: &[QueryParam]) {
        self.batch.queue(sql, params);
        debug!(
            sql = %sql,
            params = params.len(),
            queued = self.batch.len(),
            "Statement queued in batch"
        );
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<CommandResult> {
        self.enqueue(sql, params);
        Ok(CommandResult::default())
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<RowSet> {
        self.enqueue(sql, params);
        Ok(RowSet::new())
    }

    async fn query_one(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        self.enqueue(sql, params);
        Ok(None)
    }

    /// Batches do not nest; sending from inside a batch does nothing.
    async fn send_batch<R>(&mut self, statements: &[Statement]) -> ExecutorResults<R> {
        debug!(
            ignored = statements.len(),
            "send_batch called on a batch executor; ignoring"
        );
        ExecutorResults::Empty
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        _columns: &[String],
        _rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        debug!(target = %target.sanitize(), "Bulk copy rejected inside batch");
        Err(DbError::UnsupportedBulkCopyInBatch { op: Self::COPY_OP })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CopyTarget;

    #[tokio::test]
    async fn test_batch_executor_queues_in_call_order() {
        let batch = BatchAccumulator::new();
        let mut executor = BatchExecutor::new(batch.clone());

        let result = executor
            .execute("INSERT INTO t VALUES ($1)", &[QueryParam::Int(1)])
            .await
            .unwrap();
        let rows = executor.query("SELECT 1", &[]).await.unwrap();
        let row = executor.query_one("SELECT 2", &[]).await.unwrap();

        assert_eq!(result, CommandResult::default());
        assert!(rows.is_empty());
        assert!(row.is_none());

        let sql: Vec<String> = batch.statements().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql, vec!["INSERT INTO t VALUES ($1)", "SELECT 1", "SELECT 2"]);
    }

    #[tokio::test]
    async fn test_batch_executor_rejects_copy_without_queueing() {
        let batch = BatchAccumulator::new();
        batch.queue("SELECT 1", &[]);
        let mut executor = BatchExecutor::new(batch.clone());

        let err = executor
            .copy_in(
                &CopyTarget::table("users"),
                &["id".to_string()],
                &[vec![QueryParam::Int(1)]],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UnsupportedBulkCopyInBatch { .. }));
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_results_report_exhaustion_and_close_cleanly() {
        struct Never;
        impl BatchResults for Never {
            async fn next(&mut self) -> DbResult<CommandResult> {
                unreachable!()
            }
            async fn close(self) -> DbResult<()> {
                unreachable!()
            }
        }

        let mut executor = BatchExecutor::new(BatchAccumulator::new());
        let mut results: ExecutorResults<Never> =
            executor.send_batch(&[Statement::new("SELECT 1")]).await;

        assert!(results.next().await.is_err());
        assert!(results.close().await.is_ok());
        assert!(executor.is_empty());
    }

    #[test]
    fn test_executor_kind_display() {
        assert_eq!(ExecutorKind::Pool.to_string(), "pool");
        assert_eq!(ExecutorKind::Transaction.to_string(), "transaction");
        assert_eq!(ExecutorKind::Batch.to_string(), "batch");
    }
}
