//! Error types for SQLite operations.

use tabula_query::DriverError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parameter count does not match the statement.
    #[error("statement expects {expected} parameters, {given} given")]
    ParameterCount {
        /// Placeholders in the statement.
        expected: usize,
        /// Parameters supplied.
        given: usize,
    },
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<SqliteError> for DriverError {
    fn from(err: SqliteError) -> Self {
        DriverError::new(err.to_string())
    }
}
