//! Database seam: a connection trait, a typed query builder, and rows with
//! typed column getters.

mod query;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use query::{Query, SortOrder};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::collections::BTreeMap;

/// Connection to the store holding fault tables.
pub trait FaultDatabase {
    fn connect(&mut self) -> Result<(), QueryError>;
    fn query(&mut self, query: &Query) -> Result<Vec<QueryRow>, QueryError>;
    fn close(&mut self) -> Result<(), QueryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("database connection is not open")]
    NotConnected,
    #[error("failed to connect to '{target}': {reason}")]
    Connection { target: String, reason: String },
    #[error("query '{sql}' failed: {reason}")]
    Statement { sql: String, reason: String },
    #[error("database backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        QueryError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Problem reading one column of one row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColumnError {
    #[error("column '{0}' is not part of the result set")]
    Missing(String),
    #[error("column '{0}' is null")]
    Null(String),
    #[error("column '{column}' holds {found}, expected {expected}")]
    Type {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// One result row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    columns: BTreeMap<String, SqlValue>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Text value; numbers are rendered as text, null yields `None`.
    pub fn string(&self, column: &str) -> Result<Option<String>, ColumnError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(text) => Ok(Some(text.clone())),
            SqlValue::Integer(value) => Ok(Some(value.to_string())),
            SqlValue::Real(value) => Ok(Some(value.to_string())),
        }
    }

    /// Floating point value, `None` when the column is null.
    pub fn double(&self, column: &str) -> Result<Option<f64>, ColumnError> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Real(value) => Ok(Some(*value)),
            SqlValue::Integer(value) => Ok(Some(*value as f64)),
            SqlValue::Text(_) => Err(type_error(column, "a number", "text")),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, ColumnError> {
        match self.value(column)? {
            SqlValue::Integer(value) => Ok(*value),
            SqlValue::Real(value) if value.fract() == 0.0 => Ok(*value as i64),
            SqlValue::Real(_) => Err(type_error(column, "an integer", "a real")),
            SqlValue::Text(_) => Err(type_error(column, "an integer", "text")),
            SqlValue::Null => Err(ColumnError::Null(column.to_string())),
        }
    }

    fn value(&self, column: &str) -> Result<&SqlValue, ColumnError> {
        self.columns
            .get(column)
            .ok_or_else(|| ColumnError::Missing(column.to_string()))
    }
}

fn type_error(column: &str, expected: &'static str, found: &'static str) -> ColumnError {
    ColumnError::Type {
        column: column.to_string(),
        expected,
        found,
    }
}
