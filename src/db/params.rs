//! Parameter binding for PostgreSQL queries.
//!
//! Binds `QueryParam` values to sqlx query objects. Used by every store call
//! that sends SQL with positional parameters.

use crate::models::QueryParam;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Build a query for `sql` with every parameter bound in order.
pub(crate) fn bind_all<'q>(sql: &'q str, params: &'q [QueryParam]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), bind_postgres_param)
}
