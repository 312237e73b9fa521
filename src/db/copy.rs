//! Bulk copy into PostgreSQL via `COPY ... FROM STDIN`.
//!
//! Rows are encoded as CSV in memory and streamed in one piece. In CSV format
//! PostgreSQL reads an unquoted empty field as NULL and a quoted empty field as
//! the empty string, so every text value is quoted.

use crate::error::{DbError, DbResult};
use crate::models::{CopyTarget, QueryParam, quote_identifier};
use sqlx::PgConnection;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Build the `COPY` statement for `target` and `columns`.
pub fn copy_statement(target: &CopyTarget, columns: &[String]) -> DbResult<String> {
    if target.parts().is_empty() || target.parts().iter().any(String::is_empty) {
        return Err(DbError::invalid_input("Copy target must name a table"));
    }

    let mut sql = format!("COPY {}", target.sanitize());
    if !columns.is_empty() {
        let cols: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let _ = write!(sql, " ({})", cols.join(", "));
    }
    sql.push_str(" FROM STDIN WITH (FORMAT csv)");
    Ok(sql)
}

/// Encode `rows` as CSV, one line per row.
///
/// Every row must have exactly `width` values when `width` is non-zero.
pub fn encode_rows(rows: &[Vec<QueryParam>], width: usize) -> DbResult<String> {
    let mut out = String::new();

    for (index, row) in rows.iter().enumerate() {
        if width != 0 && row.len() != width {
            return Err(DbError::invalid_input(format!(
                "Row {} has {} values, expected {}",
                index,
                row.len(),
                width
            )));
        }

        for (col, value) in row.iter().enumerate() {
            if col > 0 {
                out.push(',');
            }
            encode_field(&mut out, value);
        }
        out.push('\n');
    }

    Ok(out)
}

fn encode_field(out: &mut String, value: &QueryParam) {
    match value {
        QueryParam::Null => {}
        QueryParam::Bool(v) => out.push(if *v { 't' } else { 'f' }),
        QueryParam::Int(v) => {
            let _ = write!(out, "{}", v);
        }
        QueryParam::Float(v) => encode_float(out, *v),
        QueryParam::String(v) => quote_field(out, v),
        QueryParam::Bytes(v) => {
            out.push_str("\\x");
            for byte in v {
                let _ = write!(out, "{:02x}", byte);
            }
        }
        QueryParam::Json(v) => quote_field(out, &v.to_string()),
    }
}

fn encode_float(out: &mut String, v: f64) {
    if v.is_nan() {
        out.push_str("NaN");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        let _ = write!(out, "{}", v);
    }
}

fn quote_field(out: &mut String, s: &str) {
    out.push('"');
    out.push_str(&s.replace('"', "\"\""));
    out.push('"');
}

/// Copy `rows` into `target` on `conn`, returning the number of rows copied.
pub(crate) async fn copy_in(
    conn: &mut PgConnection,
    target: &CopyTarget,
    columns: &[String],
    rows: &[Vec<QueryParam>],
    limit: Duration,
) -> DbResult<u64> {
    let sql = copy_statement(target, columns)?;
    let payload = encode_rows(rows, columns.len())?;

    debug!(
        target = %target.sanitize(),
        columns = columns.len(),
        rows = rows.len(),
        bytes = payload.len(),
        "Starting bulk copy"
    );

    match timeout(limit, stream(conn, &sql, payload)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_secs = limit.as_secs(), "Bulk copy timed out");
            Err(DbError::timeout("copy_in", limit.as_secs()))
        }
    }
}

async fn stream(conn: &mut PgConnection, sql: &str, payload: String) -> DbResult<u64> {
    let mut copy = conn.copy_in_raw(sql).await?;

    let sent = copy.send(payload.into_bytes()).await.map(|_| ());
    match sent {
        Ok(()) => Ok(copy.finish().await?),
        Err(e) => {
            if let Err(abort_err) = copy.abort(e.to_string()).await {
                warn!(error = %abort_err, "Failed to abort bulk copy");
            }
            Err(DbError::from(e))
        }
    }
}
