//! Data models shared by executors and stores.
//!
//! This module re-exports all model types used throughout the crate.

pub mod query;

// Re-export commonly used types
pub use query::{CommandResult, CopyTarget, QueryParam, Row, RowSet, Statement, quote_identifier};
