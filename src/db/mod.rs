//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Store capability traits the unit of work is written against
//! - Request-scoped context carrying the active transaction and batch
//! - Executor resolution (batch, then transaction, then pool)
//! - The PostgreSQL store: pool, transactions, batches and bulk copy
//! - Parameter binding and row decoding

pub mod batch;
pub mod context;
pub mod copy;
pub mod executor;
pub mod manager;
pub(crate) mod params;
pub mod pool;
pub(crate) mod statement;
pub mod store;
pub mod transaction;
pub mod types;

pub use batch::PgBatchResults;
pub use context::{BatchAccumulator, Context, TxHandle};
pub use executor::{
    BatchExecutor, Executor, ExecutorKind, ExecutorResults, PoolExecutor, TxExecutor,
};
pub use manager::{Manager, StoreContext};
pub use pool::PgStore;
pub use store::{BatchResults, Queryable, Store, Transaction};
pub use transaction::PgTransaction;
