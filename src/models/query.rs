//! Statement and result data models.
//!
//! This module defines the values that flow through every executor: positional
//! parameters, queued statements, command results and decoded rows.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A decoded row, keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// All rows returned by a query, in server order.
pub type RowSet = Vec<Row>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// JSON document, bound as `jsonb`
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A statement definition: SQL text plus positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
}

impl Statement {
    /// Create a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a statement from SQL text and borrowed parameters.
    pub fn with_params(sql: impl Into<String>, params: &[QueryParam]) -> Self {
        Self {
            sql: sql.into(),
            params: params.to_vec(),
        }
    }

    /// Add a parameter.
    pub fn bind(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Outcome of a statement that returns no rows.
///
/// The default value is what deferred (batched) statements report before the
/// batch has been sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub rows_affected: u64,
}

impl CommandResult {
    pub fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }
}

/// Target table of a bulk copy, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    parts: Vec<String>,
}

impl CopyTarget {
    /// Build a target from its identifier parts, e.g. `["public", "users"]`.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Unqualified table name.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Quote every part as an identifier and join them with dots.
    ///
    /// Embedded double quotes are doubled and NUL bytes are removed, so the result
    /// is safe to splice into a statement.
    pub fn sanitize(&self) -> String {
        self.parts
            .iter()
            .map(|part| quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Quote a single identifier for PostgreSQL.
pub fn quote_identifier(ident: &str) -> String {
    let escaped = ident.replace('\0', "").replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_query_param_from_option() {
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some("a")), QueryParam::String("a".into()));
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let json = serde_json::to_string(&QueryParam::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(json, "\"AQID\"");
    }

    #[test]
    fn test_statement_bind_keeps_order() {
        let stmt = Statement::new("INSERT INTO t VALUES ($1, $2)")
            .bind(1)
            .bind("x");
        assert_eq!(
            stmt.params,
            vec![QueryParam::Int(1), QueryParam::String("x".into())]
        );
    }

    #[test]
    fn test_command_result_default_is_zero() {
        assert_eq!(CommandResult::default().rows_affected, 0);
    }

    #[test]
    fn test_copy_target_sanitize() {
        let target = CopyTarget::new(["public", "users"]);
        assert_eq!(target.sanitize(), "\"public\".\"users\"");
    }

    #[test]
    fn test_copy_target_sanitize_escapes_quotes() {
        let target = CopyTarget::table("we\"ird\0name");
        assert_eq!(target.sanitize(), "\"we\"\"irdname\"");
    }
}
