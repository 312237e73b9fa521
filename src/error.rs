//! Error types for the unit-of-work layer.
//!
//! This module defines all error types using `thiserror`. Store failures keep the
//! shape they had in the base driver mapping (`Connection`, `Database`, ...), while
//! the unit-of-work variants carry the identifier of the operation that failed and
//! the underlying cause, so callers can both classify an error and log its root.

use thiserror::Error;

/// Boxed cause carried by the wrapping unit-of-work variants.
pub type Cause = Box<DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("{op}: failed to start transaction: {source}")]
    TxStartFailed {
        op: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{op}: no transaction to commit")]
    NoTransactionToCommit { op: &'static str },

    #[error("{op}: no transaction to rollback")]
    NoTransactionToRollback { op: &'static str },

    #[error("{op}: batch statement {index} failed: {source}")]
    ExecBatchFailed {
        op: &'static str,
        index: usize,
        #[source]
        source: Cause,
    },

    #[error("{op}: failed to close batch results: {source}")]
    BatchCloseFailed {
        op: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{op}: failed to commit transaction: {source}")]
    CommitFailed {
        op: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{op}: failed to rollback transaction: {source}")]
    RollbackFailed {
        op: &'static str,
        #[source]
        source: Cause,
    },

    #[error("{op}: bulk copy is not supported inside a batch")]
    UnsupportedBulkCopyInBatch { op: &'static str },
}

/// Classification of a [`DbError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Database,
    Schema,
    Transaction,
    Timeout,
    InvalidInput,
    Internal,
    TxStartFailed,
    NoTransactionToCommit,
    NoTransactionToRollback,
    ExecBatchFailed,
    BatchCloseFailed,
    CommitFailed,
    RollbackFailed,
    UnsupportedBulkCopyInBatch,
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn tx_start_failed(op: &'static str, cause: DbError) -> Self {
        Self::TxStartFailed {
            op,
            source: Box::new(cause),
        }
    }

    pub fn exec_batch_failed(op: &'static str, index: usize, cause: DbError) -> Self {
        Self::ExecBatchFailed {
            op,
            index,
            source: Box::new(cause),
        }
    }

    pub fn batch_close_failed(op: &'static str, cause: DbError) -> Self {
        Self::BatchCloseFailed {
            op,
            source: Box::new(cause),
        }
    }

    pub fn commit_failed(op: &'static str, cause: DbError) -> Self {
        Self::CommitFailed {
            op,
            source: Box::new(cause),
        }
    }

    pub fn rollback_failed(op: &'static str, cause: DbError) -> Self {
        Self::RollbackFailed {
            op,
            source: Box::new(cause),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Database { .. } => ErrorKind::Database,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Transaction { .. } => ErrorKind::Transaction,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::TxStartFailed { .. } => ErrorKind::TxStartFailed,
            Self::NoTransactionToCommit { .. } => ErrorKind::NoTransactionToCommit,
            Self::NoTransactionToRollback { .. } => ErrorKind::NoTransactionToRollback,
            Self::ExecBatchFailed { .. } => ErrorKind::ExecBatchFailed,
            Self::BatchCloseFailed { .. } => ErrorKind::BatchCloseFailed,
            Self::CommitFailed { .. } => ErrorKind::CommitFailed,
            Self::RollbackFailed { .. } => ErrorKind::RollbackFailed,
            Self::UnsupportedBulkCopyInBatch { .. } => ErrorKind::UnsupportedBulkCopyInBatch,
        }
    }

    /// Operation identifier attached by the unit-of-work layer, if any.
    pub fn op(&self) -> Option<&'static str> {
        match self {
            Self::TxStartFailed { op, .. }
            | Self::NoTransactionToCommit { op }
            | Self::NoTransactionToRollback { op }
            | Self::ExecBatchFailed { op, .. }
            | Self::BatchCloseFailed { op, .. }
            | Self::CommitFailed { op, .. }
            | Self::RollbackFailed { op, .. }
            | Self::UnsupportedBulkCopyInBatch { op } => Some(*op),
            _ => None,
        }
    }

    /// The wrapped cause, for variants that carry one.
    pub fn cause(&self) -> Option<&DbError> {
        match self {
            Self::TxStartFailed { source, .. }
            | Self::ExecBatchFailed { source, .. }
            | Self::BatchCloseFailed { source, .. }
            | Self::CommitFailed { source, .. }
            | Self::RollbackFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Walk the cause chain down to the error the store originally produced.
    pub fn root_cause(&self) -> &DbError {
        let mut current = self;
        while let Some(next) = current.cause() {
            current = next;
        }
        current
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if the root cause is retryable. Nothing in this crate retries;
    /// this only informs callers that own a retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Connection { .. } | Self::Timeout { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
