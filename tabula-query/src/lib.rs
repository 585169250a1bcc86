//! # tabula-query
//!
//! The core of the Tabula data-access layer.
//!
//! This crate turns loosely typed records and condition trees into
//! parameterized SQL for one table at a time:
//! - Per-table column caches, so unknown columns never reach SQL
//! - A condition tree with AND/OR groups, IN lists and LIKE search
//! - Statement building for SELECT, COUNT, INSERT, UPDATE and DELETE
//! - Lifecycle hooks around every create, update, delete and find
//! - Upsert with ambiguity detection
//! - A gate for hand-written SELECTs
//! - Advisory leases for association resets
//! - One `{code, message, status, data}` error shape
//!
//! Execution is delegated to a [`Driver`]; see `tabula-sqlite` for one.
//!
//! ## Conditions
//!
//! ```rust
//! use tabula_query::{Condition, ColumnSet, Dialect, RenderContext};
//!
//! let columns: ColumnSet = ["id", "price", "title"].into_iter().collect();
//! let searchable = vec!["title".to_string()];
//! let ctx = RenderContext::new(&columns).with_search_columns(&searchable);
//!
//! let filter = Condition::or([
//!     Condition::simple("price", ">", 10),
//!     Condition::search("title", "socks"),
//! ]);
//!
//! let (sql, params) = filter.render(&ctx, Dialect::Positional);
//! assert_eq!(sql, "(price > ? OR title LIKE ? ESCAPE '\\')");
//! assert_eq!(params.len(), 2);
//! ```
//!
//! ## Errors
//!
//! Every public operation of [`DataLayer`] returns a [`DataResult`]:
//!
//! ```rust
//! use tabula_query::{DataError, ErrorCode, ErrorEnvelope};
//!
//! let envelope = ErrorEnvelope::from(DataError::security("only SELECT statements are allowed"));
//! assert!(envelope.is(ErrorCode::SecurityRejection));
//! assert_eq!(envelope.status, 403);
//! ```

pub mod builder;
pub mod condition;
pub mod config;
pub mod driver;
pub mod error;
pub mod hooks;
pub mod layer;
pub mod lock;
pub mod logging;
pub mod raw;
pub mod record;
pub mod schema;
pub mod sql;
pub mod table;
pub mod value;

pub use builder::{QueryPlan, Statement, StatementBuilder, WriteOptions};
pub use condition::{BoolOp, Condition, Operator, RenderContext};
pub use config::DataLayerConfig;
pub use driver::{Driver, DriverError, Execution, RawRow, RawValue};
pub use error::{DataError, DataResult, ErrorCode, ErrorEnvelope, RawError, normalize};
pub use hooks::{Hook, HookContext, HookRegistry, HookRegistryBuilder, HookStage};
pub use layer::{AssociationOutcome, AssociationSpec, DataLayer};
pub use lock::{AdvisoryLocks, LeaseGuard};
pub use raw::RawQueryGate;
pub use record::Record;
pub use schema::ColumnSet;
pub use sql::{Dialect, SqlBuilder, sanitize_identifier};
pub use table::{FindQuery, QueryState, Select, SortOrder, TableHandle};
pub use value::{BoundParam, PlaceholderKind, Value};

pub use logging::{get_log_format, get_log_level, is_debug_enabled};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::builder::WriteOptions;
    pub use crate::condition::Condition;
    pub use crate::config::DataLayerConfig;
    pub use crate::driver::Driver;
    pub use crate::error::{DataError, DataResult, ErrorCode, ErrorEnvelope};
    pub use crate::hooks::{HookContext, HookRegistry, HookStage};
    pub use crate::layer::{AssociationOutcome, AssociationSpec, DataLayer};
    pub use crate::record::Record;
    pub use crate::table::{FindQuery, Select, SortOrder};
    pub use crate::value::{BoundParam, Value};
}
