//! The raw-query safety gate.
//!
//! Hand-written SQL enters the layer through exactly one path, and only after
//! [`RawQueryGate::check`] has accepted it:
//!
//! 1. the statement is not blank,
//! 2. it is a `SELECT`,
//! 3. it names none of the blocked tables,
//! 4. it mentions the table it is issued against.
//!
//! ```rust
//! use tabula_query::raw::RawQueryGate;
//!
//! let blocked = vec!["users".to_string()];
//! let gate = RawQueryGate::new(&blocked, "");
//!
//! assert!(gate.check("SELECT * FROM mv_products WHERE id = ?", "products").is_ok());
//! assert!(gate.check("UPDATE products SET x = 1", "products").is_err());
//! assert!(gate.check("SELECT * FROM users", "users").is_err());
//! ```

use tracing::warn;

use crate::error::DataError;

/// Validates hand-written SQL against a fixed policy.
#[derive(Debug, Clone, Copy)]
pub struct RawQueryGate<'a> {
    blocked_tables: &'a [String],
    table_prefix: &'a str,
}

impl<'a> RawQueryGate<'a> {
    /// Create a gate refusing `blocked_tables`, with or without `table_prefix`.
    pub fn new(blocked_tables: &'a [String], table_prefix: &'a str) -> Self {
        Self {
            blocked_tables,
            table_prefix,
        }
    }

    /// Accept or reject `sql` issued against the table `short_name`.
    pub fn check(&self, sql: &str, short_name: &str) -> Result<(), DataError> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(self.reject(short_name, "statement is empty"));
        }

        let upper = trimmed.to_uppercase();
        if !upper.starts_with("SELECT") {
            return Err(self.reject(short_name, "only SELECT statements are allowed"));
        }

        let lower = trimmed.to_lowercase();
        if let Some(blocked) = self.blocked_tables.iter().find(|table| {
            let table = table.to_lowercase();
            !table.is_empty()
                && (lower.contains(&table)
                    || lower.contains(&format!("{}{}", self.table_prefix.to_lowercase(), table)))
        }) {
            return Err(self.reject(short_name, &format!("statement references blocked table {blocked}")));
        }

        if short_name.is_empty() || !trimmed.contains(short_name) {
            return Err(self.reject(
                short_name,
                &format!("statement does not reference table {short_name}"),
            ));
        }

        Ok(())
    }

    fn reject(&self, table: &str, reason: &str) -> DataError {
        warn!(table, reason, "raw query rejected");
        DataError::security(reason)
    }
}
