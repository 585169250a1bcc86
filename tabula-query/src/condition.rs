//! Condition trees for building WHERE clauses.
//!
//! A [`Condition`] is a small tagged tree: simple comparisons, `IN` lists,
//! free-text searches and boolean groups. Rendering walks the tree in
//! declaration order and pushes SQL and parameters through one
//! [`SqlBuilder`], so every placeholder is paired with exactly one bound
//! parameter.
//!
//! Anything that cannot be rendered safely is dropped rather than guessed at:
//! columns missing from the table, operators outside the allow-list and values
//! with no comparison placeholder.
//!
//! ```rust
//! use tabula_query::condition::{Condition, RenderContext};
//! use tabula_query::schema::ColumnSet;
//! use tabula_query::sql::Dialect;
//! use tabula_query::value::Value;
//!
//! let columns = ColumnSet::new(["id", "title", "price"]);
//! let condition = Condition::or([
//!     Condition::simple("price", ">", 10),
//!     Condition::simple("title", "LIKE", "%socks%"),
//!     Condition::eq("no_such_column", 1),
//! ]);
//!
//! let (sql, params) = condition.render(&RenderContext::new(&columns), Dialect::Positional);
//! assert_eq!(sql, "(price > ? OR title LIKE ?)");
//! assert_eq!(params[0].value, Value::Int(10));
//! assert_eq!(params[1].value, Value::from("%socks%"));
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::record::Record;
use crate::schema::ColumnSet;
use crate::sql::{Dialect, SqlBuilder};
use crate::value::{BoundParam, Value, infer_param};

/// Comparison operator of a simple condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=` (also accepts `<>`)
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// Anything outside the allow-list. Never rendered.
    Unsupported(String),
}

impl Operator {
    /// Parse an operator, case-insensitively for the keyword forms.
    pub fn parse(op: &str) -> Self {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Self::Eq,
            "!=" | "<>" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            _ => Self::Unsupported(op.to_string()),
        }
    }

    /// SQL text of the operator, or `None` if unsupported.
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::NotEq => Some("!="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Like => Some("LIKE"),
            Self::NotLike => Some("NOT LIKE"),
            Self::Unsupported(_) => None,
        }
    }
}

impl From<&str> for Operator {
    fn from(op: &str) -> Self {
        Self::parse(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(raw) => f.write_str(raw),
            other => f.write_str(other.as_sql().unwrap_or_default()),
        }
    }
}

/// Boolean connective of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolOp {
    /// All children must hold.
    #[default]
    And,
    /// Any child may hold.
    Or,
}

impl BoolOp {
    fn separator(&self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column op value`
    Simple {
        /// Column name.
        column: String,
        /// Comparison operator.
        op: Operator,
        /// Right-hand value.
        value: Value,
    },
    /// `column [NOT] IN (values...)`
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
        /// Render `NOT IN`.
        negate: bool,
    },
    /// Children joined by one boolean connective.
    Group {
        /// Child conditions, rendered left to right.
        children: Vec<Condition>,
        /// Connective.
        op: BoolOp,
    },
    /// Substring search on a free-text column.
    Search {
        /// Column name; must be one of the configured search columns.
        column: String,
        /// Search term, matched literally.
        term: String,
    },
}

impl Condition {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::simple(column, Operator::Eq, value)
    }

    /// `column op value`
    pub fn simple(
        column: impl Into<String>,
        op: impl Into<Operator>,
        value: impl Into<Value>,
    ) -> Self {
        Self::Simple {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// `column IN (values...)`
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: false,
        }
    }

    /// `column NOT IN (values...)`
    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: true,
        }
    }

    /// All children must hold.
    pub fn and(children: impl IntoIterator<Item = Condition>) -> Self {
        Self::Group {
            children: children.into_iter().collect(),
            op: BoolOp::And,
        }
    }

    /// Any child may hold.
    pub fn or(children: impl IntoIterator<Item = Condition>) -> Self {
        Self::Group {
            children: children.into_iter().collect(),
            op: BoolOp::Or,
        }
    }

    /// Free-text substring search.
    pub fn search(column: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Search {
            column: column.into(),
            term: term.into(),
        }
    }

    /// Equality on every field of `record`, joined with AND.
    pub fn matching(record: &Record) -> Self {
        Self::and(record.iter().map(|(column, value)| Self::eq(column, value.clone())))
    }

    /// Fields pinned by equality at the top level of the tree.
    ///
    /// Walks the root and nested AND groups; OR groups, `IN` lists and
    /// searches pin nothing.
    pub fn equality_fields(&self) -> Record {
        let mut record = Record::new();
        self.collect_equalities(&mut record);
        record
    }

    fn collect_equalities(&self, out: &mut Record) {
        match self {
            Self::Simple {
                column,
                op: Operator::Eq,
                value,
            } => {
                out.set(column.clone(), value.clone());
            }
            Self::Group {
                children,
                op: BoolOp::And,
            } => {
                for child in children {
                    child.collect_equalities(out);
                }
            }
            _ => {}
        }
    }

    /// Render into a fresh SQL fragment.
    pub fn render(&self, ctx: &RenderContext<'_>, dialect: Dialect) -> (String, Vec<BoundParam>) {
        let mut builder = SqlBuilder::new(dialect);
        self.render_into(ctx, &mut builder);
        builder.build()
    }

    /// Render into `out`, returning whether anything was emitted.
    ///
    /// When nothing survives allow-listing the builder is left untouched.
    pub fn render_into(&self, ctx: &RenderContext<'_>, out: &mut SqlBuilder) -> bool {
        match self {
            Self::Simple { column, op, value } => render_simple(column, op, value, ctx, out),
            Self::In {
                column,
                values,
                negate,
            } => render_in(column, values, *negate, ctx, out),
            Self::Group { children, op } => render_group(children, *op, ctx, out),
            Self::Search { column, term } => render_search(column, term, ctx, out),
        }
    }
}

/// What a condition is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Columns of the target table.
    pub columns: &'a ColumnSet,
    /// Columns eligible for [`Condition::Search`].
    pub search_columns: &'a [String],
    /// Bind booleans through a boolean placeholder instead of 0/1.
    pub bool_placeholder: bool,
}

impl<'a> RenderContext<'a> {
    /// Render against `columns` with no search columns.
    pub fn new(columns: &'a ColumnSet) -> Self {
        Self {
            columns,
            search_columns: &[],
            bool_placeholder: false,
        }
    }

    /// Set the search columns.
    pub fn with_search_columns(mut self, search_columns: &'a [String]) -> Self {
        self.search_columns = search_columns;
        self
    }

    /// Set boolean binding.
    pub fn with_bool_placeholder(mut self, enabled: bool) -> Self {
        self.bool_placeholder = enabled;
        self
    }

    fn knows(&self, column: &str) -> bool {
        if self.columns.contains(column) {
            true
        } else {
            debug!(column, "dropping condition on unknown column");
            false
        }
    }
}

fn render_simple(
    column: &str,
    op: &Operator,
    value: &Value,
    ctx: &RenderContext<'_>,
    out: &mut SqlBuilder,
) -> bool {
    if !ctx.knows(column) {
        return false;
    }
    let Some(sql_op) = op.as_sql() else {
        warn!(column, operator = %op, "dropping condition with unsupported operator");
        return false;
    };

    if value.is_null() {
        let test = match op {
            Operator::Eq => " IS NULL",
            Operator::NotEq => " IS NOT NULL",
            _ => {
                debug!(column, operator = %op, "dropping NULL comparison");
                return false;
            }
        };
        out.push(column).push(test);
        return true;
    }

    match infer_param(value, ctx.bool_placeholder) {
        Some(param) => {
            out.push(column).push(" ").push(sql_op).push(" ").push_param(param);
            true
        }
        None => {
            debug!(column, kind = value.kind_name(), "dropping condition with unbindable value");
            false
        }
    }
}

fn render_in(
    column: &str,
    values: &[Value],
    negate: bool,
    ctx: &RenderContext<'_>,
    out: &mut SqlBuilder,
) -> bool {
    if !ctx.knows(column) {
        return false;
    }

    let params: Vec<BoundParam> = values
        .iter()
        .filter_map(|v| infer_param(v, ctx.bool_placeholder))
        .collect();
    if params.len() != values.len() {
        // Fewer excluded values would match more rows.
        if negate {
            warn!(column, "dropping NOT IN condition with unbindable values");
            return false;
        }
        debug!(
            column,
            dropped = values.len() - params.len(),
            "dropping unbindable IN values"
        );
    }

    // An empty list matches nothing (or everything when negated).
    if params.is_empty() {
        out.push(if negate { "1 = 1" } else { "1 = 0" });
        return true;
    }

    out.push(column)
        .push(if negate { " NOT IN (" } else { " IN (" });
    for (i, param) in params.into_iter().enumerate() {
        if i > 0 {
            out.push(", ");
        }
        out.push_param(param);
    }
    out.push(")");
    true
}

fn render_group(
    children: &[Condition],
    op: BoolOp,
    ctx: &RenderContext<'_>,
    out: &mut SqlBuilder,
) -> bool {
    let start = out.mark();
    if op == BoolOp::Or {
        out.push("(");
    }

    let mut rendered = 0;
    for child in children {
        let before = out.mark();
        if rendered > 0 {
            out.push(op.separator());
        }
        if child.render_into(ctx, out) {
            rendered += 1;
        } else {
            out.rollback(before);
        }
    }

    if rendered == 0 {
        out.rollback(start);
        return false;
    }
    if op == BoolOp::Or {
        out.push(")");
    }
    true
}

fn render_search(column: &str, term: &str, ctx: &RenderContext<'_>, out: &mut SqlBuilder) -> bool {
    if !ctx.knows(column) {
        return false;
    }
    if !ctx.search_columns.iter().any(|c| c == column) {
        debug!(column, "dropping search on a column that is not searchable");
        return false;
    }
    if term.is_empty() {
        return false;
    }

    out.push(column)
        .push(" LIKE ")
        .push_param(BoundParam::text(format!("%{}%", escape_like(term))))
        .push(" ESCAPE '\\'");
    true
}

/// Escape LIKE wildcards so `term` matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
