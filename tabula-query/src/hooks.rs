//! Lifecycle hooks.
//!
//! Hooks are callbacks registered against a table (or the `*` wildcard) and a
//! [`HookStage`]. They receive the record flowing through an operation and
//! return it, possibly modified, or an [`ErrorEnvelope`] that stops dispatch.
//!
//! Registration happens on a [`HookRegistryBuilder`] during composition. The
//! builder is consumed into an immutable [`HookRegistry`], so nothing can be
//! registered once operations are running.
//!
//! ```rust
//! use tabula_query::hooks::{HookRegistry, HookStage};
//! use tabula_query::record::Record;
//! use tabula_query::ErrorEnvelope;
//!
//! let registry = HookRegistry::builder()
//!     .register_hook("*", HookStage::BeforeCreate, |mut record, _ctx| {
//!         record.set("source", "api");
//!         Ok(record)
//!     })
//!     .register_hook("products", HookStage::BeforeCreate, |record, _ctx| {
//!         if record.get("title").is_none() {
//!             return Err(ErrorEnvelope::custom("missing_title", "title is required"));
//!         }
//!         Ok(record)
//!     })
//!     .build();
//!
//! let record = Record::new().with("title", "socks");
//! let record = registry.dispatch("products", HookStage::BeforeCreate, record).unwrap();
//! assert!(record.contains("source"));
//!
//! let err = registry.dispatch("products", HookStage::BeforeCreate, Record::new()).unwrap_err();
//! assert!(err.to_string().contains("title is required"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DataError, ErrorEnvelope};
use crate::record::Record;
use crate::sql::sanitize_identifier;

/// Table key matching every table.
pub const WILDCARD: &str = "*";

/// Extension points around the data-access operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before an INSERT; may rewrite the record.
    BeforeCreate,
    /// After an INSERT; sees the stored record.
    AfterCreate,
    /// Before an UPDATE; may rewrite the changes.
    BeforeUpdate,
    /// After an UPDATE; sees the stored record.
    AfterUpdate,
    /// Before a DELETE; sees the fields pinned by the match.
    BeforeDelete,
    /// After a DELETE.
    AfterDelete,
    /// Once per fetched record.
    AfterFind,
}

impl HookStage {
    /// Every stage, in lifecycle order.
    pub const ALL: [HookStage; 7] = [
        Self::BeforeCreate,
        Self::AfterCreate,
        Self::BeforeUpdate,
        Self::AfterUpdate,
        Self::BeforeDelete,
        Self::AfterDelete,
        Self::AfterFind,
    ];

    /// Get the stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeCreate => "before_create",
            Self::AfterCreate => "after_create",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
            Self::AfterFind => "after_find",
        }
    }

    /// Check whether this stage runs before the statement executes.
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            Self::BeforeCreate | Self::BeforeUpdate | Self::BeforeDelete
        )
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook is told about the operation it runs in.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Short name of the table.
    pub table: &'a str,
    /// Stage being dispatched.
    pub stage: HookStage,
}

/// A lifecycle callback.
pub trait Hook: Send + Sync {
    /// Handle `record`, returning the record to pass on.
    fn call(&self, record: Record, ctx: &HookContext<'_>) -> Result<Record, ErrorEnvelope>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> Hook for F
where
    F: Fn(Record, &HookContext<'_>) -> Result<Record, ErrorEnvelope> + Send + Sync,
{
    fn call(&self, record: Record, ctx: &HookContext<'_>) -> Result<Record, ErrorEnvelope> {
        self(record, ctx)
    }
}

/// A shared hook.
pub type SharedHook = Arc<dyn Hook>;

type HookKey = (String, HookStage);

/// Collects hooks during composition.
#[derive(Default)]
pub struct HookRegistryBuilder {
    hooks: HashMap<HookKey, Vec<SharedHook>>,
}

impl HookRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `table` (or [`WILDCARD`]) at `stage`.
    ///
    /// Hooks for the same key run in registration order.
    pub fn register_hook<F>(self, table: impl Into<String>, stage: HookStage, callback: F) -> Self
    where
        F: Fn(Record, &HookContext<'_>) -> Result<Record, ErrorEnvelope> + Send + Sync + 'static,
    {
        self.register(table, stage, callback)
    }

    /// Register a [`Hook`] implementation.
    pub fn register<H: Hook + 'static>(
        mut self,
        table: impl Into<String>,
        stage: HookStage,
        hook: H,
    ) -> Self {
        self.push(table, stage, Arc::new(hook));
        self
    }

    /// Register an already shared hook.
    ///
    /// Table keys are sanitized the same way table names are at dispatch.
    pub fn push(&mut self, table: impl Into<String>, stage: HookStage, hook: SharedHook) -> &mut Self {
        let table = table.into();
        let key = if table == WILDCARD {
            table
        } else {
            sanitize_identifier(&table)
        };
        self.hooks.entry((key, stage)).or_default().push(hook);
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> HookRegistry {
        HookRegistry { hooks: self.hooks }
    }
}

impl fmt::Debug for HookRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistryBuilder")
            .field("keys", &self.hooks.len())
            .finish()
    }
}

/// An immutable registry of hooks keyed by table and stage.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookKey, Vec<SharedHook>>,
}

impl HookRegistry {
    /// Start building a registry.
    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::new()
    }

    /// A registry with no hooks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Check whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn chain<'a>(&'a self, table: &str, stage: HookStage) -> impl Iterator<Item = &'a SharedHook> + 'a {
        let global = self.hooks.get(&(WILDCARD.to_string(), stage));
        let specific = if table == WILDCARD {
            None
        } else {
            self.hooks.get(&(table.to_string(), stage))
        };
        global.into_iter().chain(specific).flatten()
    }

    /// Check whether any hook would run for `table` at `stage`.
    pub fn has_hooks(&self, table: &str, stage: HookStage) -> bool {
        self.chain(table, stage).next().is_some()
    }

    /// Run the hooks for `table` at `stage`, threading the record through.
    ///
    /// Wildcard hooks run first, then table hooks, each in registration
    /// order. The first error stops dispatch.
    pub fn dispatch(&self, table: &str, stage: HookStage, record: Record) -> Result<Record, DataError> {
        let ctx = HookContext { table, stage };
        let mut record = record;
        for hook in self.chain(table, stage) {
            crate::tabula_trace!(table, stage = %stage, hook = hook.name(), "dispatching hook");
            record = hook.call(record, &ctx).map_err(|envelope| {
                debug!(table, stage = %stage, hook = hook.name(), code = %envelope.code, "hook failed");
                DataError::Hook {
                    table: table.to_string(),
                    stage,
                    envelope,
                }
            })?;
        }
        Ok(record)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .hooks
            .iter()
            .map(|((table, stage), hooks)| format!("{table}:{stage}x{}", hooks.len()))
            .collect();
        keys.sort();
        f.debug_struct("HookRegistry").field("hooks", &keys).finish()
    }
}
