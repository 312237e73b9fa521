//! Statement execution on a single PostgreSQL connection.
//!
//! Both the pool store and open transactions end up here once they hold a
//! connection. Every call is bounded by the store's statement timeout.

use crate::db::params::bind_all;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{CommandResult, QueryParam, Row, RowSet, Statement};
use sqlx::PgConnection;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Run `fut` under `limit`, mapping expiry to a timeout error for `operation`.
pub(crate) async fn bounded<T, F>(operation: &str, limit: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DbError::from(e)),
        Err(_) => Err(timeout_error(operation, limit)),
    }
}

fn timeout_error(operation: &str, limit: Duration) -> DbError {
    warn!(
        operation = %operation,
        timeout_secs = limit.as_secs(),
        "Statement timed out"
    );
    DbError::timeout(operation, limit.as_secs())
}

pub(crate) async fn execute(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
    limit: Duration,
) -> DbResult<CommandResult> {
    let result = bounded("execute", limit, bind_all(sql, params).execute(&mut *conn)).await?;

    debug!(
        sql = %sql,
        params = params.len(),
        rows_affected = result.rows_affected(),
        "Executed statement"
    );

    Ok(CommandResult::new(result.rows_affected()))
}

pub(crate) async fn fetch_all(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
    limit: Duration,
) -> DbResult<RowSet> {
    let rows = bounded("query", limit, bind_all(sql, params).fetch_all(&mut *conn)).await?;

    debug!(sql = %sql, row_count = rows.len(), "Queried rows");

    Ok(rows.iter().map(RowToJson::to_json_map).collect())
}

pub(crate) async fn fetch_optional(
    conn: &mut PgConnection,
    sql: &str,
    params: &[QueryParam],
    limit: Duration,
) -> DbResult<Option<Row>> {
    let row = bounded(
        "query_one",
        limit,
        bind_all(sql, params).fetch_optional(&mut *conn),
    )
    .await?;

    Ok(row.as_ref().map(RowToJson::to_json_map))
}

/// Execute `statements` in order, stopping after the first failure.
///
/// One outcome is recorded per statement that was attempted.
pub(crate) async fn run_batch(
    conn: &mut PgConnection,
    statements: &[Statement],
    limit: Duration,
) -> Vec<DbResult<CommandResult>> {
    let mut outcomes = Vec::with_capacity(statements.len());

    for (index, statement) in statements.iter().enumerate() {
        let outcome = execute(conn, &statement.sql, &statement.params, limit).await;
        let failed = outcome.is_err();
        outcomes.push(outcome);

        if failed {
            debug!(
                index,
                remaining = statements.len() - index - 1,
                "Batch stopped at failing statement"
            );
            break;
        }
    }

    outcomes
}
