//! Open PostgreSQL transactions.

use crate::db::batch::PgBatchResults;
use crate::db::copy;
use crate::db::statement::{self, bounded};
use crate::db::store::{Queryable, Transaction};
use crate::error::DbResult;
use crate::models::{CommandResult, CopyTarget, QueryParam, Row, RowSet, Statement};
use sqlx::Postgres;
use std::fmt;
use std::time::Duration;

/// A transaction opened by `PgStore::begin`, pinned to one pooled connection.
///
/// Dropping it without committing rolls it back when the connection returns to
/// the pool.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    statement_timeout: Duration,
}

impl PgTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>, statement_timeout: Duration) -> Self {
        Self {
            tx,
            statement_timeout,
        }
    }
}

impl fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTransaction")
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

impl Queryable for PgTransaction {
    type Results = PgBatchResults;

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<CommandResult> {
        statement::execute(&mut self.tx, sql, params, self.statement_timeout).await
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<RowSet> {
        statement::fetch_all(&mut self.tx, sql, params, self.statement_timeout).await
    }

    async fn query_one(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        statement::fetch_optional(&mut self.tx, sql, params, self.statement_timeout).await
    }

    /// Statements run in order on this transaction's connection. A failure
    /// leaves the transaction aborted; the caller is expected to roll back.
    async fn send_batch(&mut self, statements: &[Statement]) -> PgBatchResults {
        PgBatchResults::new(statement::run_batch(&mut self.tx, statements, self.statement_timeout).await)
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        copy::copy_in(&mut self.tx, target, columns, rows, self.statement_timeout).await
    }
}

impl Transaction for PgTransaction {
    async fn commit(self) -> DbResult<()> {
        bounded("commit", self.statement_timeout, self.tx.commit()).await
    }

    async fn rollback(self) -> DbResult<()> {
        bounded("rollback", self.statement_timeout, self.tx.rollback()).await
    }
}
