//! Data layer configuration.
//!
//! ```rust
//! use std::time::Duration;
//! use tabula_query::config::DataLayerConfig;
//! use tabula_query::sql::Dialect;
//!
//! let config = DataLayerConfig::new()
//!     .table_prefix("mv_")
//!     .block_table("sessions")
//!     .dialect(Dialect::Numbered)
//!     .lock_ttl(Duration::from_secs(30));
//!
//! assert!(config.blocked_tables.iter().any(|t| t == "users"));
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Environment Variables
//!
//! - `TABULA_TABLE_PREFIX` - prefix prepended to every table name
//! - `TABULA_BLOCKED_TABLES` - comma separated raw-query blocklist (replaces the default)
//! - `TABULA_DEFAULT_LIMIT` - page size used when a find sets none
//! - `TABULA_LOCK_TTL_SECS` - lease length of advisory locks

use std::time::Duration;

use tracing::info;

use crate::error::DataError;
use crate::sql::Dialect;
use crate::table::SortOrder;

/// Configuration shared by every table of a [`DataLayer`](crate::layer::DataLayer).
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayerConfig {
    /// Prefix prepended to every table name.
    pub table_prefix: String,
    /// Tables the raw-query gate refuses to touch.
    pub blocked_tables: Vec<String>,
    /// Columns eligible for substring search.
    pub search_columns: Vec<String>,
    /// Unique column used to match upserts when no id is given.
    pub slug_column: String,
    /// Page size when a find sets none.
    pub default_limit: u64,
    /// Upper bound on any page size.
    pub max_limit: u64,
    /// Ordering column when a find sets none (or an unknown one).
    pub default_order_by: String,
    /// Sort direction when a find sets none.
    pub default_order: SortOrder,
    /// Placeholder syntax of the driver.
    pub dialect: Dialect,
    /// Bind booleans through a boolean placeholder where the dialect has one.
    pub bool_placeholder: bool,
    /// Lease length of advisory locks.
    pub lock_ttl: Duration,
}

impl Default for DataLayerConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            blocked_tables: vec!["users".to_string(), "usermeta".to_string()],
            search_columns: ["title", "name", "description", "content", "slug"]
                .into_iter()
                .map(String::from)
                .collect(),
            slug_column: "slug".to_string(),
            default_limit: 100,
            max_limit: 1000,
            default_order_by: "id".to_string(),
            default_order: SortOrder::Desc,
            dialect: Dialect::Positional,
            bool_placeholder: false,
            lock_ttl: Duration::from_secs(60),
        }
    }
}

impl DataLayerConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from the process environment.
    pub fn from_env() -> Result<Self, DataError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            prefix = %config.table_prefix,
            blocked = config.blocked_tables.len(),
            "DataLayerConfig loaded from environment"
        );
        Ok(config)
    }

    /// Load overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DataError> {
        let mut config = Self::default();

        if let Some(prefix) = lookup("TABULA_TABLE_PREFIX") {
            config.table_prefix = prefix.trim().to_string();
        }
        if let Some(tables) = lookup("TABULA_BLOCKED_TABLES") {
            config.blocked_tables = tables
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(limit) = lookup("TABULA_DEFAULT_LIMIT") {
            config.default_limit = parse_number("TABULA_DEFAULT_LIMIT", &limit)?;
        }
        if let Some(ttl) = lookup("TABULA_LOCK_TTL_SECS") {
            config.lock_ttl = Duration::from_secs(parse_number("TABULA_LOCK_TTL_SECS", &ttl)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the table prefix.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Add a table to the raw-query blocklist.
    pub fn block_table(mut self, table: impl Into<String>) -> Self {
        self.blocked_tables.push(table.into());
        self
    }

    /// Replace the raw-query blocklist.
    pub fn blocked_tables<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.blocked_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the search columns.
    pub fn search_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.search_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the slug column.
    pub fn slug_column(mut self, column: impl Into<String>) -> Self {
        self.slug_column = column.into();
        self
    }

    /// Set the default page size.
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the maximum page size.
    pub fn max_limit(mut self, limit: u64) -> Self {
        self.max_limit = limit;
        self
    }

    /// Set the default ordering.
    pub fn default_order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.default_order_by = column.into();
        self.default_order = order;
        self
    }

    /// Set the placeholder dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Enable or disable boolean placeholders.
    pub fn bool_placeholder(mut self, enabled: bool) -> Self {
        self.bool_placeholder = enabled;
        self
    }

    /// Set the advisory lock lease length.
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Whether booleans actually bind through a boolean placeholder.
    pub fn binds_booleans(&self) -> bool {
        self.bool_placeholder && self.dialect.supports_bool_placeholder()
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(DataError::Configuration("page sizes must be positive".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(DataError::Configuration(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        if self.lock_ttl.is_zero() {
            return Err(DataError::Configuration("lock_ttl must be positive".into()));
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, DataError> {
    raw.trim()
        .parse()
        .map_err(|_| DataError::Configuration(format!("{key} must be a positive integer, got {raw:?}")))
}
