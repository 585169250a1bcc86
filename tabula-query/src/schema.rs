//! Table column sets.
//!
//! A [`ColumnSet`] is the live column list of one table as reported by the
//! driver. It is the single authority on which fields may be written or
//! filtered; anything not in it is dropped before SQL is rendered.

use indexmap::IndexSet;

/// Ordered set of column names belonging to one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: IndexSet<String>,
}

impl ColumnSet {
    /// Create a column set from names in declaration order.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether `column` belongs to the table.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Check whether the table has an `id` column.
    pub fn has_id(&self) -> bool {
        self.contains("id")
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over the columns in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
