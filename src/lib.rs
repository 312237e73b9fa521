//! db-uow library
//!
//! Routes SQL statements through one of three executors (the shared pool, an open
//! transaction, or a deferred batch) based on a request-scoped [`Context`], and
//! provides a [`UnitOfWork`] that begins, commits and rolls back those scopes
//! against PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod uow;

pub use config::Config;
pub use db::{Context, Executor, Manager, PgStore, Queryable};
pub use error::{DbError, DbResult, ErrorKind};
pub use uow::{BeginMode, UnitOfWork};
