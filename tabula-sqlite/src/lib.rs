//! SQLite driver for the Tabula data-access layer.
//!
//! [`SqliteDriver`] implements [`tabula_query::Driver`] over a single
//! `rusqlite` connection. Statements are cached per connection, parameters
//! are bound by position, and table columns are introspected with
//! `PRAGMA table_info`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tabula_query::{DataLayer, DataLayerConfig, HookRegistry, Record};
//! use tabula_sqlite::SqliteDriver;
//!
//! let mut driver = SqliteDriver::open_url("sqlite::memory:").unwrap();
//! driver
//!     .execute_batch("CREATE TABLE products (id INTEGER PRIMARY KEY, title TEXT)")
//!     .unwrap();
//!
//! let mut layer = DataLayer::new(
//!     driver,
//!     Arc::new(HookRegistry::empty()),
//!     Arc::new(DataLayerConfig::default()),
//! )
//! .unwrap();
//!
//! let stored = layer
//!     .create("products", Record::new().with("title", "socks"))
//!     .unwrap();
//! assert_eq!(stored.get("id").and_then(|v| v.as_i64()), Some(1));
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use connection::{Prepared, SqliteDriver};
pub use error::{SqliteError, SqliteResult};
