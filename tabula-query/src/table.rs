//! Table handles and per-query pagination state.
//!
//! A [`TableHandle`] is created once per logical table. It owns the cached
//! column set (fetched lazily from the driver on first use) and a small piece
//! of fluent pagination state that is consumed and reset by the next find:
//!
//! ```rust
//! use tabula_query::table::{SortOrder, TableHandle};
//!
//! let mut handle = TableHandle::new("products", "mv_").unwrap();
//! assert_eq!(handle.qualified_name(), "mv_products");
//!
//! handle.limit(2).offset(2).order_by("id", SortOrder::Asc);
//! let state = handle.take_state();
//! assert_eq!(state.limit, Some(2));
//! assert!(handle.state().is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::Condition;
use crate::driver::Driver;
use crate::error::DataError;
use crate::schema::ColumnSet;
use crate::sql::sanitize_identifier;

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order.
    Asc,
    /// Descending order.
    #[default]
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse `asc`/`desc`, case-insensitively.
    pub fn parse(order: &str) -> Option<Self> {
        match order.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// The select list of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Select {
    /// `*`
    #[default]
    All,
    /// Specific columns; unknown ones are dropped.
    Columns(Vec<String>),
}

impl Select {
    /// Select specific columns.
    pub fn columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }

    /// Render against the table's columns, falling back to `*`.
    pub fn to_sql(&self, columns: &ColumnSet) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::Columns(requested) => {
                let kept: Vec<&str> = requested
                    .iter()
                    .map(String::as_str)
                    .filter(|c| columns.contains(c))
                    .collect();
                if kept.is_empty() {
                    "*".to_string()
                } else {
                    kept.join(", ")
                }
            }
        }
    }
}

/// Pagination, ordering and select overrides for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Column to order by.
    pub order_by: Option<String>,
    /// Sort direction.
    pub order: Option<SortOrder>,
    /// Select list.
    pub select: Select,
}

impl QueryState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: QueryState) -> QueryState {
        QueryState {
            limit: self.limit.or(fallback.limit),
            offset: self.offset.or(fallback.offset),
            order_by: self.order_by.or(fallback.order_by),
            order: self.order.or(fallback.order),
            select: match self.select {
                Select::All => fallback.select,
                columns => columns,
            },
        }
    }
}

/// The `query` argument of a find: an optional condition plus overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Filter.
    pub condition: Option<Condition>,
    /// Pagination and ordering overrides.
    pub state: QueryState,
}

impl FindQuery {
    /// A query with no filter and no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Set the limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.state.limit = Some(limit);
        self
    }

    /// Set the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.state.offset = Some(offset);
        self
    }

    /// Set the ordering.
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.state.order_by = Some(column.into());
        self.state.order = Some(order);
        self
    }

    /// Set the select list.
    pub fn select(mut self, select: Select) -> Self {
        self.state.select = select;
        self
    }
}

impl From<Condition> for FindQuery {
    fn from(condition: Condition) -> Self {
        Self::new().filter(condition)
    }
}

/// Per-table context: names, cached columns and pending query state.
#[derive(Debug)]
pub struct TableHandle {
    qualified_name: String,
    short_name: String,
    columns: RwLock<Option<Arc<ColumnSet>>>,
    state: QueryState,
}

impl TableHandle {
    /// Create a handle for `short_name`, qualified with `prefix`.
    ///
    /// Both parts are sanitized; a name that sanitizes to nothing is refused.
    pub fn new(short_name: &str, prefix: &str) -> Result<Self, DataError> {
        let short_name = sanitize_identifier(short_name);
        if short_name.is_empty() {
            return Err(DataError::Configuration(
                "table name is empty after sanitizing".to_string(),
            ));
        }
        Ok(Self {
            qualified_name: format!("{}{}", sanitize_identifier(prefix), short_name),
            short_name,
            columns: RwLock::new(None),
            state: QueryState::default(),
        })
    }

    /// Pre-seed the column cache instead of introspecting.
    pub fn with_columns(self, columns: ColumnSet) -> Self {
        *self.columns.write() = Some(Arc::new(columns));
        self
    }

    /// Table name as it appears in SQL, prefix included.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Table name without prefix.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Get the table's columns, introspecting on first use.
    pub fn columns<D: Driver + ?Sized>(&self, driver: &mut D) -> Result<Arc<ColumnSet>, DataError> {
        if let Some(columns) = self.columns.read().as_ref() {
            return Ok(Arc::clone(columns));
        }

        let fetched = driver.introspect_columns(&self.qualified_name)?;
        if fetched.is_empty() {
            return Err(DataError::Configuration(format!(
                "table {} has no columns",
                self.qualified_name
            )));
        }
        debug!(table = %self.qualified_name, count = fetched.len(), "cached table columns");

        let columns = Arc::new(ColumnSet::new(fetched));
        *self.columns.write() = Some(Arc::clone(&columns));
        Ok(columns)
    }

    /// Columns if already cached.
    pub fn cached_columns(&self) -> Option<Arc<ColumnSet>> {
        self.columns.read().clone()
    }

    /// Set the limit of the next find.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.state.limit = Some(limit);
        self
    }

    /// Set the offset of the next find.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.offset = Some(offset);
        self
    }

    /// Set the ordering of the next find.
    pub fn order_by(&mut self, column: impl Into<String>, order: SortOrder) -> &mut Self {
        self.state.order_by = Some(column.into());
        self.state.order = Some(order);
        self
    }

    /// Set the select list of the next find.
    pub fn select(&mut self, select: Select) -> &mut Self {
        self.state.select = select;
        self
    }

    /// Pending query state.
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Take the pending state, resetting it for the next query.
    pub fn take_state(&mut self) -> QueryState {
        std::mem::take(&mut self.state)
    }
}
