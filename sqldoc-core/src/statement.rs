//! Dialect-specific statements with bound parameters.
//!
//! Every table has the same shape in every dialect: a key column and a payload column.
//!
//! | dialect            | key column | payload column             |
//! |--------------------|------------|----------------------------|
//! | Postgres-JSON      | `id`       | `data jsonb`               |
//! | SqlServer-XML      | `[Id]`     | `[Data] XML`               |
//! | SqlServer-Generic  | `[Id]`     | `[Data] NVARCHAR(MAX)`     |
//!
//! Deletes always match the key column; the key is never recovered from the payload.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    operation::Verb,
    target::Dialect,
};

/// A value bound into a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Uuid(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// What a statement does, for executors that interpret statements rather than send text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert a row. Parameters: key, payload.
    Insert { table: String },
    /// Replace a row's payload. Parameters: payload, key.
    Update { table: String },
    /// Delete a row. Parameters: key.
    Delete { table: String },
    /// Select a row's payload by key. Parameters: key.
    Load { table: String },
    /// Caller-supplied query text.
    Query,
}

/// One statement ready for a backend: SQL text in the target dialect plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub command: Command,
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Builds the statement applying one mutation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] if `table` is not a plain identifier.
    pub fn for_verb(
        dialect: Dialect,
        verb: Verb,
        table: &str,
        key: SqlValue,
        payload: String,
    ) -> DocumentStoreResult<Self> {
        check_table_name(table)?;

        let key_col = dialect.key_column();
        let data_col = dialect.data_column();

        Ok(match verb {
            Verb::Insert => Statement {
                command: Command::Insert { table: table.to_string() },
                sql: format!(
                    "INSERT INTO {table} ({key_col}, {data_col}) VALUES ({}, {})",
                    dialect.placeholder(1),
                    dialect.payload_placeholder(2),
                ),
                params: vec![key, SqlValue::Text(payload)],
            },
            Verb::Update => Statement {
                command: Command::Update { table: table.to_string() },
                sql: format!(
                    "UPDATE {table} SET {data_col} = {} WHERE {key_col} = {}",
                    dialect.payload_placeholder(1),
                    dialect.placeholder(2),
                ),
                params: vec![SqlValue::Text(payload), key],
            },
            Verb::Delete => Statement {
                command: Command::Delete { table: table.to_string() },
                sql: format!(
                    "DELETE FROM {table} WHERE {key_col} = {}",
                    dialect.placeholder(1),
                ),
                params: vec![key],
            },
        })
    }

    /// Builds the statement selecting one document's payload by key.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] if `table` is not a plain identifier.
    pub fn load(dialect: Dialect, table: &str, key: SqlValue) -> DocumentStoreResult<Self> {
        check_table_name(table)?;

        Ok(Statement {
            command: Command::Load { table: table.to_string() },
            sql: format!(
                "SELECT {} FROM {table} WHERE {} = {}",
                dialect.data_column(),
                dialect.key_column(),
                dialect.placeholder(1),
            ),
            params: vec![key],
        })
    }

    /// Wraps caller-supplied query text whose placeholders are already positional.
    pub fn query(sql: String, params: Vec<SqlValue>) -> Self {
        Statement { command: Command::Query, sql, params }
    }
}

/// Accepts `name` or `schema.name` where each part is `[A-Za-z_][A-Za-z0-9_]*`.
fn check_table_name(table: &str) -> DocumentStoreResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts = table.split('.').collect::<Vec<_>>();
    if parts.len() <= 2 && parts.into_iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(DocumentStoreError::ContractViolation(format!(
            "'{table}' is not a valid table name"
        )))
    }
}
