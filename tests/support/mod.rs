//! Recording in-memory store shared by the integration tests.
//!
//! Every call that reaches the store is appended to a shared log as a short
//! string (`"begin"`, `"tx1.execute INSERT ..."`, `"results.next 0"`, ...), so
//! tests can assert both what happened and in which order. Faults can be
//! injected per operation.

#![allow(dead_code)]

use db_uow::db::{BatchResults, Queryable, Store, Transaction};
use db_uow::error::{DbError, DbResult};
use db_uow::models::{CommandResult, CopyTarget, QueryParam, Row, RowSet, Statement};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Faults the recording store will produce.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub fail_begin: bool,
    /// Index of the batch result that fails when drained.
    pub fail_batch_at: Option<usize>,
    pub fail_close: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    /// SQL text whose execution fails.
    pub fail_sql: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    log: Arc<Mutex<Vec<String>>>,
    faults: Arc<Mutex<Faults>>,
    next_tx: Arc<AtomicU32>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let store = Self::new();
        *store.faults.lock().unwrap() = faults;
        store
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    /// Everything recorded so far, in order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Number of recorded calls whose entry contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.contains(needle))
            .count()
    }

    fn faults(&self) -> Faults {
        self.faults.lock().unwrap().clone()
    }
}

fn record(log: &Arc<Mutex<Vec<String>>>, entry: String) {
    log.lock().unwrap().push(entry);
}

fn row_for(sql: &str) -> Row {
    let mut row = Row::new();
    row.insert("sql".to_string(), JsonValue::String(sql.to_string()));
    row
}

fn statement_error(sql: &str) -> DbError {
    DbError::database(format!("statement failed: {sql}"), Some("23505".to_string()), "")
}

/// Shared implementation of the statement operations, labelled by scope.
#[derive(Debug, Clone)]
struct Recorder {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    faults: Arc<Mutex<Faults>>,
}

impl Recorder {
    fn execute(&self, sql: &str) -> DbResult<CommandResult> {
        record(&self.log, format!("{}.execute {}", self.label, sql));
        if self.faults.lock().unwrap().fail_sql.as_deref() == Some(sql) {
            return Err(statement_error(sql));
        }
        Ok(CommandResult::new(1))
    }

    fn query(&self, sql: &str) -> DbResult<RowSet> {
        record(&self.log, format!("{}.query {}", self.label, sql));
        Ok(vec![row_for(sql)])
    }

    fn query_one(&self, sql: &str) -> DbResult<Option<Row>> {
        record(&self.log, format!("{}.query_one {}", self.label, sql));
        Ok(Some(row_for(sql)))
    }

    fn send_batch(&self, statements: &[Statement]) -> RecordingResults {
        record(
            &self.log,
            format!("{}.send_batch {}", self.label, statements.len()),
        );
        let faults = self.faults.lock().unwrap().clone();
        RecordingResults {
            log: Arc::clone(&self.log),
            sql: statements.iter().map(|s| s.sql.clone()).collect(),
            drained: 0,
            fail_at: faults.fail_batch_at,
            fail_close: faults.fail_close,
        }
    }

    fn copy_in(&self, target: &CopyTarget, rows: &[Vec<QueryParam>]) -> DbResult<u64> {
        record(
            &self.log,
            format!("{}.copy_in {} {}", self.label, target.sanitize(), rows.len()),
        );
        Ok(rows.len() as u64)
    }
}

impl Queryable for RecordingStore {
    type Results = RecordingResults;

    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<CommandResult> {
        self.recorder().execute(sql)
    }

    async fn query(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<RowSet> {
        self.recorder().query(sql)
    }

    async fn query_one(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<Option<Row>> {
        self.recorder().query_one(sql)
    }

    async fn send_batch(&mut self, statements: &[Statement]) -> RecordingResults {
        self.recorder().send_batch(statements)
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        _columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        self.recorder().copy_in(target, rows)
    }
}

impl RecordingStore {
    fn recorder(&self) -> Recorder {
        Recorder {
            label: "pool".to_string(),
            log: Arc::clone(&self.log),
            faults: Arc::clone(&self.faults),
        }
    }
}

impl Store for RecordingStore {
    type Tx = RecordingTx;

    async fn begin(&self) -> DbResult<RecordingTx> {
        record(&self.log, "begin".to_string());
        if self.faults().fail_begin {
            return Err(DbError::connection("connection refused", "start the server"));
        }

        let id = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RecordingTx {
            recorder: Recorder {
                label: format!("tx{id}"),
                log: Arc::clone(&self.log),
                faults: Arc::clone(&self.faults),
            },
        })
    }
}

#[derive(Debug)]
pub struct RecordingTx {
    recorder: Recorder,
}

impl Queryable for RecordingTx {
    type Results = RecordingResults;

    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<CommandResult> {
        self.recorder.execute(sql)
    }

    async fn query(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<RowSet> {
        self.recorder.query(sql)
    }

    async fn query_one(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<Option<Row>> {
        self.recorder.query_one(sql)
    }

    async fn send_batch(&mut self, statements: &[Statement]) -> RecordingResults {
        self.recorder.send_batch(statements)
    }

    async fn copy_in(
        &mut self,
        target: &CopyTarget,
        _columns: &[String],
        rows: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        self.recorder.copy_in(target, rows)
    }
}

impl Transaction for RecordingTx {
    async fn commit(self) -> DbResult<()> {
        record(&self.recorder.log, format!("{}.commit", self.recorder.label));
        if self.recorder.faults.lock().unwrap().fail_commit {
            return Err(DbError::connection("connection reset", "retry the unit of work"));
        }
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        record(&self.recorder.log, format!("{}.rollback", self.recorder.label));
        if self.recorder.faults.lock().unwrap().fail_rollback {
            return Err(DbError::connection("connection reset", "retry the unit of work"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingResults {
    log: Arc<Mutex<Vec<String>>>,
    sql: Vec<String>,
    drained: usize,
    fail_at: Option<usize>,
    fail_close: bool,
}

impl BatchResults for RecordingResults {
    async fn next(&mut self) -> DbResult<CommandResult> {
        let index = self.drained;
        self.drained += 1;
        record(&self.log, format!("results.next {index}"));

        match self.sql.get(index) {
            None => Err(DbError::internal("batch result stream exhausted")),
            Some(sql) if self.fail_at == Some(index) => Err(statement_error(sql)),
            Some(_) => Ok(CommandResult::new(1)),
        }
    }

    async fn close(self) -> DbResult<()> {
        record(&self.log, "results.close".to_string());
        if self.fail_close {
            return Err(DbError::internal("close failed"));
        }
        Ok(())
    }
}
