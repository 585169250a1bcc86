//! # Tabula
//!
//! A schema-aware relational data-access layer.
//!
//! Tabula provides:
//! - CRUD, upsert, count and paginated find over any table, one call each
//! - A WHERE-clause DSL that binds every value as a parameter
//! - Columns checked against the live schema before they reach SQL
//! - Lifecycle hooks per table or for all tables
//! - A single `{code, message, status, data}` error shape
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tabula::prelude::*;
//! use tabula::sqlite::SqliteDriver;
//!
//! let mut driver = SqliteDriver::memory().unwrap();
//! driver
//!     .execute_batch("CREATE TABLE products (id INTEGER PRIMARY KEY, title TEXT, price REAL)")
//!     .unwrap();
//!
//! let hooks = HookRegistry::builder()
//!     .register_hook("products", HookStage::BeforeCreate, |record, _ctx| {
//!         if record.get("title").is_none() {
//!             return Err(ErrorEnvelope::custom("missing_title", "title is required"));
//!         }
//!         Ok(record)
//!     })
//!     .build();
//!
//! let mut layer = DataLayer::new(driver, Arc::new(hooks), Arc::new(DataLayerConfig::default())).unwrap();
//!
//! layer.create("products", Record::new().with("title", "socks").with("price", 12.5)).unwrap();
//! layer.create("products", Record::new().with("title", "hat").with("price", 4.0)).unwrap();
//!
//! let cheap = layer
//!     .find("products", FindQuery::new().filter(Condition::simple("price", "<", 10)))
//!     .unwrap();
//! assert_eq!(cheap.len(), 1);
//!
//! let err = layer.create("products", Record::new().with("price", 1)).unwrap_err();
//! assert_eq!(err.code, "missing_title");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use tabula_query::*;

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use tabula_sqlite::*;
}

/// Prelude for common imports.
pub mod prelude {
    pub use tabula_query::prelude::*;

    #[cfg(feature = "sqlite")]
    pub use tabula_sqlite::{SqliteConfig, SqliteDriver};
}
