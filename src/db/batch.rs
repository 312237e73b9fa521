//! Batch results for the PostgreSQL store.

use crate::db::store::BatchResults;
use crate::error::{DbError, DbResult};
use crate::models::CommandResult;
use std::collections::VecDeque;

/// Replays the recorded outcome of each statement in a sent batch.
///
/// Statements after the first failure were never attempted and have no
/// outcome; draining past the recorded outcomes reports exhaustion.
#[derive(Debug, Default)]
pub struct PgBatchResults {
    outcomes: VecDeque<DbResult<CommandResult>>,
    close_error: Option<DbError>,
}

impl PgBatchResults {
    pub fn new(outcomes: Vec<DbResult<CommandResult>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            close_error: None,
        }
    }

    /// A batch that failed before any statement ran.
    pub fn failed(error: DbError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Attach an error to report when the stream is closed.
    pub fn with_close_error(mut self, error: DbError) -> Self {
        self.close_error = Some(error);
        self
    }

    /// Outcomes not yet drained.
    pub fn remaining(&self) -> usize {
        self.outcomes.len()
    }
}

impl BatchResults for PgBatchResults {
    async fn next(&mut self) -> DbResult<CommandResult> {
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Err(DbError::internal("batch result stream exhausted")))
    }

    async fn close(self) -> DbResult<()> {
        match self.close_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
