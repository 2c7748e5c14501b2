use super::{FaultDatabase, Query, QueryError, QueryRow, SqlValue};
use crate::config::DatabaseConfig;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only SQLite backend. Geometry columns hold WKT text.
#[derive(Debug)]
pub struct SqliteDatabase {
    path: PathBuf,
    connection: Option<Connection>,
}

impl SqliteDatabase {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            connection: None,
        }
    }

    /// Resolves the database file as `url` joined with `name`.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        if config.username.is_some() || config.password.is_some() {
            debug!("sqlite backend ignores database credentials");
        }
        let path = if config.url.trim().is_empty() {
            PathBuf::from(&config.name)
        } else {
            Path::new(config.url.trim()).join(&config.name)
        };
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FaultDatabase for SqliteDatabase {
    fn connect(&mut self) -> Result<(), QueryError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|err| QueryError::Connection {
                target: self.path.display().to_string(),
                reason: err.to_string(),
            })?;
        debug!(path = %self.path.display(), "connected to fault database");
        self.connection = Some(connection);
        Ok(())
    }

    fn query(&mut self, query: &Query) -> Result<Vec<QueryRow>, QueryError> {
        let connection = self.connection.as_ref().ok_or(QueryError::NotConnected)?;
        let sql = query.to_string();
        let statement_error = |err: rusqlite::Error| QueryError::Statement {
            sql: sql.clone(),
            reason: err.to_string(),
        };

        let mut statement = connection.prepare(&sql).map_err(statement_error)?;
        let names: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = statement.query([]).map_err(statement_error)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(statement_error)? {
            let mut result = QueryRow::new();
            for (index, name) in names.iter().enumerate() {
                let value = match row.get_ref(index).map_err(statement_error)? {
                    ValueRef::Null | ValueRef::Blob(_) => SqlValue::Null,
                    ValueRef::Integer(value) => SqlValue::Integer(value),
                    ValueRef::Real(value) => SqlValue::Real(value),
                    ValueRef::Text(bytes) => {
                        SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                };
                result.insert(name.as_str(), value);
            }
            results.push(result);
        }

        debug!(%sql, rows = results.len(), "query complete");
        Ok(results)
    }

    fn close(&mut self) -> Result<(), QueryError> {
        if let Some(connection) = self.connection.take() {
            connection.close().map_err(|(_, err)| QueryError::from(err))?;
        }
        Ok(())
    }
}
