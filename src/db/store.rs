//! Store capability traits.
//!
//! The unit-of-work layer never talks to a driver directly. It is written against
//! these traits, which a connection pool (`Store`) and its transactions
//! (`Transaction`) implement. `PgStore` is the sqlx-backed implementation; tests
//! substitute a recording store.

use crate::error::DbResult;
use crate::models::{CommandResult, CopyTarget, QueryParam, Row, RowSet, Statement};
use std::future::Future;

/// The uniform statement-issuing operation set.
///
/// Pools, transactions and the executors resolved from a context all expose the
/// same five operations. Failures surface exactly as the implementation produced
/// them; nothing here retries.
pub trait Queryable: Send {
    /// Result stream returned by [`Queryable::send_batch`].
    type Results: BatchResults;

    /// Execute a statement that returns no rows.
    fn execute(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<CommandResult>> + Send;

    /// Execute a statement and collect every returned row.
    fn query(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<RowSet>> + Send;

    /// Execute a statement expected to return at most one row.
    fn query_one(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Option<Row>>> + Send;

    /// Send the statements as one batch. Per-statement failures are reported by
    /// the returned stream, not here.
    fn send_batch(&mut self, statements: &[Statement]) -> impl Future<Output = Self::Results> + Send;

    /// Bulk-load rows into `target`, returning the number of rows copied.
    fn copy_in(
        &mut self,
        target: &CopyTarget,
        columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> impl Future<Output = DbResult<u64>> + Send;
}

/// The shared pool capability.
pub trait Store: Queryable + Clone + Sync + 'static {
    /// Transaction type opened by [`Store::begin`].
    type Tx: Transaction<Results = Self::Results>;

    /// Open a new transaction on a pooled connection.
    fn begin(&self) -> impl Future<Output = DbResult<Self::Tx>> + Send;
}

/// An open transaction.
pub trait Transaction: Queryable + 'static {
    fn commit(self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Per-statement results of a sent batch, drained in submission order.
pub trait BatchResults: Send {
    /// Result of the next statement in the batch.
    fn next(&mut self) -> impl Future<Output = DbResult<CommandResult>> + Send;

    /// Release the stream. Consumes it, so it can only happen once.
    fn close(self) -> impl Future<Output = DbResult<()>> + Send;
}
