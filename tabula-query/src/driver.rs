//! The driver seam consumed by the data-access layer.
//!
//! A driver owns the connection and its transaction semantics. The layer only
//! asks it to prepare a statement with already-typed parameters, execute it,
//! report its last error and list a table's columns.

use thiserror::Error;

use crate::value::BoundParam;

/// A low-level failure reported by a driver.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    /// The driver's message.
    pub message: String,
    /// The statement that failed, if known.
    pub sql: Option<String>,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: None,
        }
    }

    /// Attach the failing statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

/// A single cell as returned by the driver, before record mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// SQL NULL.
    Null,
    /// Integer storage.
    Integer(i64),
    /// Floating point storage.
    Real(f64),
    /// Text storage.
    Text(String),
    /// Binary storage.
    Blob(Vec<u8>),
}

/// A row as returned by the driver: column names paired with raw cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// Column names in select-list order.
    pub columns: Vec<String>,
    /// Cell values, parallel to `columns`.
    pub values: Vec<RawValue>,
}

impl RawRow {
    /// Create a row from `(column, value)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (impl Into<String>, RawValue)>) -> Self {
        let (columns, values) = pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self { columns, values }
    }

    /// Look up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }
}

/// Outcome of executing a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The statement produced rows.
    Rows(Vec<RawRow>),
    /// The statement modified rows.
    Affected {
        /// Rows changed.
        count: u64,
        /// Row id generated by an INSERT, if any.
        last_insert_id: Option<i64>,
    },
}

impl Execution {
    /// Take the rows, or an empty list for write outcomes.
    pub fn into_rows(self) -> Vec<RawRow> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected { .. } => Vec::new(),
        }
    }

    /// Number of rows changed (zero for reads).
    pub fn affected(&self) -> u64 {
        match self {
            Self::Rows(_) => 0,
            Self::Affected { count, .. } => *count,
        }
    }

    /// Row id generated by an INSERT.
    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            Self::Rows(_) => None,
            Self::Affected { last_insert_id, .. } => *last_insert_id,
        }
    }
}

/// A synchronous SQL driver.
///
/// Every call blocks until the database answers. Implementations record the
/// message of the most recent failure so it can be surfaced through
/// [`last_error`](Driver::last_error); a successful `prepare` clears it.
pub trait Driver {
    /// A statement ready for execution.
    type Statement;

    /// Prepare `sql` with parameters bound in placeholder order.
    fn prepare(&mut self, sql: &str, params: &[BoundParam]) -> Result<Self::Statement, DriverError>;

    /// Execute a prepared statement.
    fn execute(&mut self, statement: Self::Statement) -> Result<Execution, DriverError>;

    /// Message of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;

    /// List the columns of `table` in declaration order.
    fn introspect_columns(&mut self, table: &str) -> Result<Vec<String>, DriverError>;

    /// Prepare and execute in one step.
    fn run(&mut self, sql: &str, params: &[BoundParam]) -> Result<Execution, DriverError> {
        let statement = self.prepare(sql, params)?;
        self.execute(statement)
    }
}

impl<D: Driver + ?Sized> Driver for &mut D {
    type Statement = D::Statement;

    fn prepare(&mut self, sql: &str, params: &[BoundParam]) -> Result<Self::Statement, DriverError> {
        (**self).prepare(sql, params)
    }

    fn execute(&mut self, statement: Self::Statement) -> Result<Execution, DriverError> {
        (**self).execute(statement)
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }

    fn introspect_columns(&mut self, table: &str) -> Result<Vec<String>, DriverError> {
        (**self).introspect_columns(table)
    }
}
