//! SQL generation utilities.

use crate::value::{BoundParam, PlaceholderKind};

/// Strip everything but ASCII alphanumerics and underscores from an identifier.
///
/// Table and column names are never taken verbatim from request input; they
/// pass through here first.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Placeholder syntax understood by the target driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// SQLite / MySQL style `?`.
    #[default]
    Positional,
    /// PostgreSQL style `$1`, `$2`, ...
    Numbered,
    /// printf style `%s`, `%d`, `%f`, chosen by placeholder kind.
    Typed,
}

impl Dialect {
    /// Get the placeholder for the parameter at `index` (1-based).
    pub fn placeholder(&self, index: usize, kind: PlaceholderKind) -> String {
        match self {
            Self::Positional => "?".to_string(),
            Self::Numbered => format!("${}", index),
            Self::Typed => match kind {
                PlaceholderKind::Integer | PlaceholderKind::Boolean => "%d".to_string(),
                PlaceholderKind::Float => "%f".to_string(),
                PlaceholderKind::Text => "%s".to_string(),
            },
        }
    }

    /// Whether the dialect has a dedicated boolean placeholder.
    pub fn supports_bool_placeholder(&self) -> bool {
        matches!(self, Self::Numbered)
    }
}

/// Count the placeholders in `sql`, ignoring anything inside quoted literals.
pub fn placeholder_count(sql: &str, dialect: Dialect) -> usize {
    let mut count = 0;
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            continue;
        }
        if in_literal {
            continue;
        }
        match (dialect, c) {
            (Dialect::Positional, '?') => count += 1,
            (Dialect::Numbered, '$') => {
                if chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                    count += 1;
                    while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                        chars.next();
                    }
                }
            }
            (Dialect::Typed, '%') => match chars.peek() {
                Some('s' | 'd' | 'f') => {
                    count += 1;
                    chars.next();
                }
                Some('%') => {
                    chars.next();
                }
                _ => {}
            },
            _ => {}
        }
    }

    count
}

/// A saved position inside a [`SqlBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    sql_len: usize,
    param_len: usize,
}

/// Accumulates SQL text and parameters in lock-step.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<BoundParam>,
}

impl SqlBuilder {
    /// Create a new builder.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    /// Push literal SQL.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.sql.push_str(sql.as_ref());
        self
    }

    /// Push a placeholder and bind its parameter.
    pub fn push_param(&mut self, param: BoundParam) -> &mut Self {
        let index = self.params.len() + 1;
        self.sql.push_str(&self.dialect.placeholder(index, param.kind));
        self.params.push(param);
        self
    }

    /// Remember the current position so a fragment can be abandoned.
    pub fn mark(&self) -> Mark {
        Mark {
            sql_len: self.sql.len(),
            param_len: self.params.len(),
        }
    }

    /// Discard everything pushed since `mark`.
    pub fn rollback(&mut self, mark: Mark) {
        self.sql.truncate(mark.sql_len);
        self.params.truncate(mark.param_len);
    }

    /// Check whether anything was pushed since `mark`.
    pub fn grew_since(&self, mark: Mark) -> bool {
        self.sql.len() > mark.sql_len
    }

    /// Get the dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Get the SQL built so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the parameters bound so far.
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    /// Check whether no SQL has been pushed.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Finish and return the SQL and parameters.
    pub fn build(self) -> (String, Vec<BoundParam>) {
        (self.sql, self.params)
    }
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("mv_products"), "mv_products");
        assert_eq!(sanitize_identifier("products; DROP TABLE x"), "productsDROPTABLEx");
        assert_eq!(sanitize_identifier("`wp-posts`"), "wpposts");
    }

    #[test]
    fn test_dialect_placeholder() {
        assert_eq!(Dialect::Positional.placeholder(3, PlaceholderKind::Text), "?");
        assert_eq!(Dialect::Numbered.placeholder(5, PlaceholderKind::Integer), "$5");
        assert_eq!(Dialect::Typed.placeholder(1, PlaceholderKind::Integer), "%d");
        assert_eq!(Dialect::Typed.placeholder(1, PlaceholderKind::Float), "%f");
        assert_eq!(Dialect::Typed.placeholder(1, PlaceholderKind::Text), "%s");
    }

    #[test]
    fn test_placeholder_count_skips_literals() {
        assert_eq!(placeholder_count("a = ? AND b = '?'", Dialect::Positional), 1);
        assert_eq!(placeholder_count("a = $1 AND b IN ($2, $3)", Dialect::Numbered), 3);
        assert_eq!(placeholder_count("a = %d AND b LIKE %s AND c = '100%'", Dialect::Typed), 2);
        assert_eq!(placeholder_count("a LIKE ? ESCAPE '\\'", Dialect::Positional), 1);
    }

    #[test]
    fn test_sql_builder() {
        let mut builder = SqlBuilder::new(Dialect::Numbered);
        builder
            .push("SELECT * FROM products WHERE id = ")
            .push_param(BoundParam::new(PlaceholderKind::Integer, 42i64))
            .push(" AND title = ")
            .push_param(BoundParam::text("socks"));

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT * FROM products WHERE id = $1 AND title = $2");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value, Value::Int(42));
    }

    #[test]
    fn test_rollback_discards_fragment() {
        let mut builder = SqlBuilder::new(Dialect::Positional);
        builder.push("a = ").push_param(BoundParam::text("x"));
        let mark = builder.mark();
        builder.push(" AND b = ").push_param(BoundParam::text("y"));
        assert!(builder.grew_since(mark));

        builder.rollback(mark);
        assert!(!builder.grew_since(mark));
        assert_eq!(builder.sql(), "a = ?");
        assert_eq!(builder.params().len(), 1);
    }
}
