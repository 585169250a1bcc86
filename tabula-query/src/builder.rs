//! Statement building.
//!
//! [`StatementBuilder`] turns a table, a record and/or a condition tree into
//! complete SELECT, COUNT, INSERT, UPDATE and DELETE statements. Column names
//! only ever come from the table's [`ColumnSet`]; values only ever travel as
//! bound parameters.
//!
//! ```rust
//! use tabula_query::builder::StatementBuilder;
//! use tabula_query::condition::Condition;
//! use tabula_query::config::DataLayerConfig;
//! use tabula_query::schema::ColumnSet;
//! use tabula_query::table::{QueryState, SortOrder};
//!
//! let columns = ColumnSet::new(["id", "title", "price"]);
//! let config = DataLayerConfig::default();
//! let builder = StatementBuilder::new("products", &columns, &config);
//!
//! let state = QueryState {
//!     limit: Some(2),
//!     offset: Some(2),
//!     order_by: Some("id".into()),
//!     order: Some(SortOrder::Asc),
//!     ..Default::default()
//! };
//! let statement = builder.select(Some(&Condition::simple("price", ">", 10)), &state).unwrap();
//! assert_eq!(
//!     statement.sql,
//!     "SELECT * FROM products WHERE price > ? ORDER BY id ASC LIMIT 2,2"
//! );
//! ```

use tracing::debug;

use crate::condition::{Condition, RenderContext};
use crate::config::DataLayerConfig;
use crate::error::DataError;
use crate::record::{Record, bind_write_value};
use crate::schema::ColumnSet;
use crate::sql::{Dialect, SqlBuilder, placeholder_count};
use crate::table::QueryState;
use crate::value::BoundParam;

/// Timestamp format written to `created` / `modified` columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A complete statement ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<BoundParam>,
}

impl Statement {
    /// Pair SQL with its parameters, refusing a count mismatch.
    pub fn checked(sql: String, params: Vec<BoundParam>, dialect: Dialect) -> Result<Self, DataError> {
        let expected = placeholder_count(&sql, dialect);
        if expected != params.len() {
            return Err(DataError::validation(
                "params",
                format!("statement has {} placeholders but {} parameters", expected, params.len()),
            ));
        }
        Ok(Self { sql, params })
    }
}

/// The resolved parts of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Select list.
    pub select_clause: String,
    /// WHERE body, empty when unfiltered.
    pub where_sql: String,
    /// Parameters of `where_sql`.
    pub params: Vec<BoundParam>,
    /// ORDER BY body, empty when no ordering column exists.
    pub order_sql: String,
    /// Page size.
    pub limit: u64,
    /// Rows skipped.
    pub offset: u64,
}

impl QueryPlan {
    /// Render the plan as a SELECT against `table`.
    pub fn to_statement(&self, table: &str, dialect: Dialect) -> Result<Statement, DataError> {
        let mut sql = format!("SELECT {} FROM {}", self.select_clause, table);
        if !self.where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_sql);
        }
        if !self.order_sql.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_sql);
        }
        match dialect {
            Dialect::Numbered => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", self.limit, self.offset));
            }
            Dialect::Positional | Dialect::Typed => {
                sql.push_str(&format!(" LIMIT {},{}", self.offset, self.limit));
            }
        }
        Statement::checked(sql, self.params.clone(), dialect)
    }
}

/// Options for INSERT and UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Stamp `modified` with the current time on update.
    pub touch_modified: bool,
    /// Fail instead of silently dropping unknown columns.
    pub strict_columns: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            touch_modified: true,
            strict_columns: false,
        }
    }
}

impl WriteOptions {
    /// Leave audit timestamps alone.
    pub fn maintenance() -> Self {
        Self {
            touch_modified: false,
            ..Self::default()
        }
    }

    /// Refuse records carrying unknown columns.
    pub fn strict(mut self) -> Self {
        self.strict_columns = true;
        self
    }
}

/// Builds statements for one table.
#[derive(Debug, Clone)]
pub struct StatementBuilder<'a> {
    table: &'a str,
    columns: &'a ColumnSet,
    config: &'a DataLayerConfig,
    timestamp: Option<String>,
}

impl<'a> StatementBuilder<'a> {
    /// Create a builder for `table` with its cached `columns`.
    pub fn new(table: &'a str, columns: &'a ColumnSet, config: &'a DataLayerConfig) -> Self {
        Self {
            table,
            columns,
            config,
            timestamp: None,
        }
    }

    /// Use a fixed timestamp instead of the current time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    fn now(&self) -> String {
        self.timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string())
    }

    fn render_context(&self) -> RenderContext<'a> {
        RenderContext::new(self.columns)
            .with_search_columns(&self.config.search_columns)
            .with_bool_placeholder(self.config.binds_booleans())
    }

    fn render_where(&self, condition: Option<&Condition>, out: &mut SqlBuilder) -> bool {
        match condition {
            Some(condition) => condition.render_into(&self.render_context(), out),
            None => false,
        }
    }

    /// Check whether `condition` renders to a non-empty predicate.
    pub fn renders(&self, condition: &Condition) -> bool {
        let mut builder = SqlBuilder::new(self.config.dialect);
        self.render_where(Some(condition), &mut builder)
    }

    /// Resolve a SELECT into its parts.
    pub fn plan(&self, condition: Option<&Condition>, state: &QueryState) -> Result<QueryPlan, DataError> {
        let mut builder = SqlBuilder::new(self.config.dialect);
        self.render_where(condition, &mut builder);
        let (where_sql, params) = builder.build();

        let limit = state
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit);

        let order_by = match state.order_by.as_deref() {
            Some(column) if self.columns.contains(column) => Some(column),
            Some(column) => {
                debug!(table = self.table, column, "ignoring unknown order column");
                self.default_order_column()
            }
            None => self.default_order_column(),
        };
        let order_sql = order_by
            .map(|column| {
                let order = state.order.unwrap_or(self.config.default_order);
                format!("{} {}", column, order.as_sql())
            })
            .unwrap_or_default();

        let plan = QueryPlan {
            select_clause: state.select.to_sql(self.columns),
            where_sql,
            params,
            order_sql,
            limit,
            offset: state.offset.unwrap_or(0),
        };
        debug_assert_eq!(
            placeholder_count(&plan.where_sql, self.config.dialect),
            plan.params.len()
        );
        Ok(plan)
    }

    fn default_order_column(&self) -> Option<&'a str> {
        let column = self.config.default_order_by.as_str();
        self.columns.contains(column).then_some(column)
    }

    /// Build a paginated SELECT.
    pub fn select(&self, condition: Option<&Condition>, state: &QueryState) -> Result<Statement, DataError> {
        self.plan(condition, state)?
            .to_statement(self.table, self.config.dialect)
    }

    /// Build a `COUNT(*)` over the same filter, without pagination.
    pub fn count(&self, condition: Option<&Condition>) -> Result<Statement, DataError> {
        let mut builder = SqlBuilder::new(self.config.dialect);
        builder.push("SELECT COUNT(*) AS count FROM ").push(self.table);
        let mark = builder.mark();
        builder.push(" WHERE ");
        if !self.render_where(condition, &mut builder) {
            builder.rollback(mark);
        }
        let (sql, params) = builder.build();
        Statement::checked(sql, params, self.config.dialect)
    }

    fn writable(&self, record: &Record, options: WriteOptions) -> Result<Record, DataError> {
        let mut record = record.clone();
        let dropped = record.retain_columns(self.columns);
        if !dropped.is_empty() {
            if options.strict_columns {
                return Err(DataError::security(format!(
                    "unknown columns for {}: {}",
                    self.table,
                    dropped.join(", ")
                )));
            }
            for column in &dropped {
                debug!(table = self.table, column = %column, "dropping unknown column");
            }
        }
        Ok(record)
    }

    /// Build an INSERT.
    ///
    /// `created` and `modified` are stamped when the table has them and the
    /// record does not set them.
    pub fn insert(&self, record: &Record, options: WriteOptions) -> Result<Statement, DataError> {
        let mut record = self.writable(record, options)?;
        let now = self.now();
        for stamp in ["created", "modified"] {
            if self.columns.contains(stamp) && !record.contains(stamp) {
                record.set(stamp, now.as_str());
            }
        }
        if record.is_empty() {
            return Err(DataError::validation("record", "no writable columns"));
        }

        let bind_bool = self.config.binds_booleans();
        let mut builder = SqlBuilder::new(self.config.dialect);
        builder.push("INSERT INTO ").push(self.table).push(" (");
        for (i, column) in record.columns().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column);
        }
        builder.push(") VALUES (");
        for (i, (_, value)) in record.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push_param(bind_write_value(value, bind_bool));
        }
        builder.push(")");

        let (sql, params) = builder.build();
        Statement::checked(sql, params, self.config.dialect)
    }

    /// Build an UPDATE of the rows matching `condition`.
    ///
    /// The `id` column is never assigned. Refuses to build when the condition
    /// renders to nothing.
    pub fn update(
        &self,
        record: &Record,
        condition: &Condition,
        options: WriteOptions,
    ) -> Result<Statement, DataError> {
        let mut record = self.writable(record, options)?;
        record.remove("id");
        if options.touch_modified && self.columns.contains("modified") {
            record.set("modified", self.now());
        }
        if record.is_empty() {
            return Err(DataError::validation("record", "no writable columns"));
        }

        let bind_bool = self.config.binds_booleans();
        let mut builder = SqlBuilder::new(self.config.dialect);
        builder.push("UPDATE ").push(self.table).push(" SET ");
        for (i, (column, value)) in record.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder
                .push(column)
                .push(" = ")
                .push_param(bind_write_value(value, bind_bool));
        }
        builder.push(" WHERE ");
        if !self.render_where(Some(condition), &mut builder) {
            return Err(DataError::validation(
                "match",
                "refusing to update without a usable condition",
            ));
        }

        let (sql, params) = builder.build();
        Statement::checked(sql, params, self.config.dialect)
    }

    /// Build a DELETE of the rows matching `condition`.
    ///
    /// Refuses to build an unconditional DELETE.
    pub fn delete(&self, condition: &Condition) -> Result<Statement, DataError> {
        let mut builder = SqlBuilder::new(self.config.dialect);
        builder.push("DELETE FROM ").push(self.table).push(" WHERE ");
        if !self.render_where(Some(condition), &mut builder) {
            return Err(DataError::validation(
                "match",
                "refusing to delete without a usable condition",
            ));
        }
        let (sql, params) = builder.build();
        Statement::checked(sql, params, self.config.dialect)
    }
}
