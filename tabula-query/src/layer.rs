//! The data-access entry points.
//!
//! [`DataLayer`] ties everything together: it owns the driver and one
//! [`TableHandle`] per table, and runs every operation through the same
//! pipeline:
//!
//! ```text
//! resolve table -> before_* hooks -> build statement -> execute -> after_* hooks
//! ```
//!
//! Every public operation returns a [`DataResult`], so the only error shape a
//! caller ever sees is the [`ErrorEnvelope`].
//!
//! A `before_*` hook failure aborts before any statement executes. An
//! `after_*` hook failure is reported, but the write it follows stays
//! committed.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::builder::{Statement, StatementBuilder, WriteOptions};
use crate::condition::Condition;
use crate::config::DataLayerConfig;
use crate::driver::{Driver, DriverError, Execution};
use crate::error::{DataError, DataResult, ErrorEnvelope, RawError, normalize};
use crate::hooks::{HookRegistry, HookStage};
use crate::lock::AdvisoryLocks;
use crate::raw::RawQueryGate;
use crate::record::Record;
use crate::schema::ColumnSet;
use crate::sql::sanitize_identifier;
use crate::table::{FindQuery, QueryState, SortOrder, TableHandle};
use crate::value::{BoundParam, Value};

/// A link table relating owners to targets, e.g. products to categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSpec {
    /// Short name of the link table.
    pub link_table: String,
    /// Column holding the owner id.
    pub owner_column: String,
    /// Column holding the target id.
    pub target_column: String,
}

impl AssociationSpec {
    /// Describe a link table.
    pub fn new(
        link_table: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            link_table: link_table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// Result of [`DataLayer::reset_association`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationOutcome {
    /// Another writer holds the lease; nothing was touched.
    Skipped,
    /// The owner's links were replaced.
    Applied {
        /// Link rows removed.
        removed: u64,
        /// Link rows created.
        linked: usize,
    },
}

/// A table resolved for one operation.
struct Resolved {
    key: String,
    qualified: String,
    short: String,
    columns: Arc<ColumnSet>,
}

/// The schema-aware CRUD pipeline over a driver.
pub struct DataLayer<D: Driver> {
    driver: D,
    tables: IndexMap<String, TableHandle>,
    hooks: Arc<HookRegistry>,
    config: Arc<DataLayerConfig>,
    locks: Arc<AdvisoryLocks>,
}

impl<D: Driver> DataLayer<D> {
    /// Compose a data layer.
    pub fn new(driver: D, hooks: Arc<HookRegistry>, config: Arc<DataLayerConfig>) -> DataResult<Self> {
        config.validate()?;
        info!(
            hooks = hooks.len(),
            prefix = %config.table_prefix,
            "data layer composed"
        );
        Ok(Self {
            driver,
            tables: IndexMap::new(),
            hooks,
            config,
            locks: Arc::new(AdvisoryLocks::new()),
        })
    }

    /// Share a lease table with other layers in the process.
    pub fn with_locks(mut self, locks: Arc<AdvisoryLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &DataLayerConfig {
        &self.config
    }

    /// The hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The lease table.
    pub fn locks(&self) -> &Arc<AdvisoryLocks> {
        &self.locks
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Release the driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Get the handle of `name`, creating it on first use.
    pub fn table(&mut self, name: &str) -> DataResult<&mut TableHandle> {
        Ok(self.handle_mut(name)?)
    }

    /// Register a table with a known column set, skipping introspection.
    pub fn register_table(&mut self, name: &str, columns: ColumnSet) -> DataResult<&mut TableHandle> {
        let handle = TableHandle::new(name, &self.config.table_prefix)?.with_columns(columns);
        let key = handle.short_name().to_string();
        self.tables.insert(key.clone(), handle);
        Ok(&mut self.tables[&key])
    }

    /// Insert `record` into `table`, returning the stored row.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn create(&mut self, table: &str, record: Record) -> DataResult<Record> {
        report(self.create_inner(table, record, WriteOptions::default()))
    }

    /// Update the rows of `table` matching `matcher` with `record`.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn update(&mut self, table: &str, record: Record, matcher: &Condition) -> DataResult<Record> {
        report(self.update_inner(table, record, matcher, WriteOptions::default()))
    }

    /// [`update`](Self::update) with explicit write options.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn update_with(
        &mut self,
        table: &str,
        record: Record,
        matcher: &Condition,
        options: WriteOptions,
    ) -> DataResult<Record> {
        report(self.update_inner(table, record, matcher, options))
    }

    /// Insert `record`, or update the row it matches.
    ///
    /// The match is `matcher` if given, else the record's `id`, else its slug
    /// column. With none of those the record is inserted.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn upsert(&mut self, table: &str, record: Record, matcher: Option<&Condition>) -> DataResult<Record> {
        report(self.upsert_inner(table, record, matcher))
    }

    /// Delete the rows of `table` matching `matcher`.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn delete(&mut self, table: &str, matcher: &Condition) -> DataResult<()> {
        report(self.delete_inner(table, matcher).map(|_| ()))
    }

    /// Fetch a page of records.
    ///
    /// Overrides in `query` take precedence over state set on the table
    /// handle; the handle's state is reset either way.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn find(&mut self, table: &str, query: FindQuery) -> DataResult<Vec<Record>> {
        report(self.find_inner(table, query))
    }

    /// Fetch the first record matching `matcher`.
    ///
    /// "First" is the lowest `id` when the table has one, regardless of the
    /// configured default ordering.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn find_one(&mut self, table: &str, matcher: &Condition) -> DataResult<Option<Record>> {
        report(self.find_one_inner(table, matcher))
    }

    /// Count the records matching the query's condition.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn get_count(&mut self, table: &str, query: &FindQuery) -> DataResult<u64> {
        report(self.count_inner(table, query))
    }

    /// Run hand-written SQL, after the raw-query gate accepts it.
    ///
    /// `params` are bound exactly as given.
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    pub fn find_raw(&mut self, table: &str, sql: &str, params: Vec<BoundParam>) -> DataResult<Vec<Record>> {
        report(self.find_raw_inner(table, sql, params))
    }

    /// Replace the links of `owner_id` in an association table.
    ///
    /// Runs under an advisory lease keyed by link table and owner. If another
    /// writer holds the lease the call is skipped. The lease deadline is
    /// checked before every write.
    #[instrument(level = "debug", skip_all, fields(table = %spec.link_table))]
    pub fn reset_association(
        &mut self,
        spec: &AssociationSpec,
        owner_id: impl Into<Value>,
        targets: impl IntoIterator<Item = Value>,
    ) -> DataResult<AssociationOutcome> {
        report(self.reset_association_inner(spec, owner_id.into(), targets))
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn handle_mut(&mut self, name: &str) -> Result<&mut TableHandle, DataError> {
        let key = sanitize_identifier(name);
        if !self.tables.contains_key(&key) {
            let handle = TableHandle::new(&key, &self.config.table_prefix)?;
            self.tables.insert(key.clone(), handle);
        }
        self.tables
            .get_mut(&key)
            .ok_or_else(|| DataError::Configuration(format!("no handle for table {key}")))
    }

    fn resolve(&mut self, name: &str) -> Result<Resolved, DataError> {
        let key = self.handle_mut(name)?.short_name().to_string();
        let handle = self
            .tables
            .get(&key)
            .ok_or_else(|| DataError::Configuration(format!("no handle for table {key}")))?;
        let columns = handle.columns(&mut self.driver)?;
        Ok(Resolved {
            qualified: handle.qualified_name().to_string(),
            short: handle.short_name().to_string(),
            key,
            columns,
        })
    }

    fn run(&mut self, statement: &Statement) -> Result<Execution, DataError> {
        debug!(sql = %statement.sql, param_count = statement.params.len(), "executing statement");
        crate::tabula_debug!(params = ?statement.params, "statement parameters");
        let execution = self
            .driver
            .run(&statement.sql, &statement.params)
            .map_err(|err| match err.sql {
                Some(_) => err,
                None => err.with_sql(statement.sql.as_str()),
            })?;

        if let Some(envelope) = normalize(RawError::Driver(self.driver.last_error())) {
            return Err(DriverError::new(envelope.message)
                .with_sql(statement.sql.as_str())
                .into());
        }
        Ok(execution)
    }

    fn fetch(
        &mut self,
        t: &Resolved,
        condition: Option<&Condition>,
        state: &QueryState,
    ) -> Result<Vec<Record>, DataError> {
        let statement = StatementBuilder::new(&t.qualified, &t.columns, &self.config)
            .select(condition, state)?;
        let rows = self.run(&statement)?.into_rows();
        Ok(rows.into_iter().map(Record::from_row).collect())
    }

    fn fetch_first(&mut self, t: &Resolved, condition: &Condition) -> Result<Option<Record>, DataError> {
        let mut state = QueryState {
            limit: Some(1),
            ..QueryState::default()
        };
        if t.columns.has_id() {
            state.order_by = Some("id".to_string());
            state.order = Some(SortOrder::Asc);
        }
        Ok(self.fetch(t, Some(condition), &state)?.into_iter().next())
    }

    fn require_usable(&self, t: &Resolved, condition: &Condition) -> Result<(), DataError> {
        let builder = StatementBuilder::new(&t.qualified, &t.columns, &self.config);
        if builder.renders(condition) {
            Ok(())
        } else {
            Err(DataError::validation(
                "match",
                "match condition has no usable columns",
            ))
        }
    }

    fn create_inner(&mut self, table: &str, record: Record, options: WriteOptions) -> Result<Record, DataError> {
        let t = self.resolve(table)?;
        let record = self.hooks.dispatch(&t.short, HookStage::BeforeCreate, record)?;

        let statement = StatementBuilder::new(&t.qualified, &t.columns, &self.config)
            .insert(&record, options)?;
        let execution = self.run(&statement)?;

        let stored = match execution.last_insert_id() {
            Some(id) if t.columns.has_id() => self
                .fetch_first(&t, &Condition::eq("id", id))?
                .unwrap_or_else(|| record.with("id", id)),
            _ => record,
        };
        self.hooks.dispatch(&t.short, HookStage::AfterCreate, stored)
    }

    fn update_inner(
        &mut self,
        table: &str,
        record: Record,
        matcher: &Condition,
        options: WriteOptions,
    ) -> Result<Record, DataError> {
        let t = self.resolve(table)?;
        let record = self.hooks.dispatch(&t.short, HookStage::BeforeUpdate, record)?;

        let statement = StatementBuilder::new(&t.qualified, &t.columns, &self.config)
            .update(&record, matcher, options)?;
        let affected = self.run(&statement)?.affected();
        debug!(table = %t.short, affected, "rows updated");

        let stored = match self.fetch_first(&t, matcher)? {
            Some(stored) => stored,
            None => record.merged_over(&matcher.equality_fields()),
        };
        self.hooks.dispatch(&t.short, HookStage::AfterUpdate, stored)
    }

    fn derive_match(&self, t: &Resolved, record: &Record) -> Option<Condition> {
        if let Some(id) = record.id().filter(|_| t.columns.has_id()) {
            return Some(Condition::eq("id", id.clone()));
        }
        let slug = self.config.slug_column.as_str();
        record
            .get(slug)
            .filter(|v| !v.is_null() && t.columns.contains(slug))
            .map(|v| Condition::eq(slug, v.clone()))
    }

    fn upsert_inner(
        &mut self,
        table: &str,
        record: Record,
        matcher: Option<&Condition>,
    ) -> Result<Record, DataError> {
        let t = self.resolve(table)?;
        let condition = match matcher {
            Some(condition) => Some(condition.clone()),
            None => self.derive_match(&t, &record),
        };
        let Some(condition) = condition else {
            debug!(table = %t.short, "no match for upsert, inserting");
            return self.create_inner(table, record, WriteOptions::default());
        };
        self.require_usable(&t, &condition)?;

        let probe = QueryState {
            limit: Some(2),
            ..QueryState::default()
        };
        let mut existing = self.fetch(&t, Some(&condition), &probe)?;
        match existing.len() {
            0 => self.create_inner(table, record, WriteOptions::default()),
            1 => {
                let existing = existing.remove(0);
                let target = match existing.id() {
                    Some(id) => Condition::eq("id", id.clone()),
                    None => condition,
                };
                let merged = record.merged_over(&existing);
                self.update_inner(table, merged, &target, WriteOptions::default())
            }
            matches => Err(DataError::DuplicateConflict {
                table: t.short,
                matches,
            }),
        }
    }

    fn delete_inner(&mut self, table: &str, matcher: &Condition) -> Result<u64, DataError> {
        let t = self.resolve(table)?;
        let statement = StatementBuilder::new(&t.qualified, &t.columns, &self.config).delete(matcher)?;

        let pinned = matcher.equality_fields();
        let pinned = self.hooks.dispatch(&t.short, HookStage::BeforeDelete, pinned)?;
        let affected = self.run(&statement)?.affected();
        debug!(table = %t.short, affected, "rows deleted");

        self.hooks.dispatch(&t.short, HookStage::AfterDelete, pinned)?;
        Ok(affected)
    }

    fn after_find(&self, t: &Resolved, records: Vec<Record>) -> Result<Vec<Record>, DataError> {
        if !self.hooks.has_hooks(&t.short, HookStage::AfterFind) {
            return Ok(records);
        }
        records
            .into_iter()
            .map(|r| self.hooks.dispatch(&t.short, HookStage::AfterFind, r))
            .collect()
    }

    fn find_inner(&mut self, table: &str, query: FindQuery) -> Result<Vec<Record>, DataError> {
        let t = self.resolve(table)?;
        let pending = match self.tables.get_mut(&t.key) {
            Some(handle) => handle.take_state(),
            None => QueryState::default(),
        };
        let state = query.state.or(pending);

        let records = self.fetch(&t, query.condition.as_ref(), &state)?;
        self.after_find(&t, records)
    }

    fn find_one_inner(&mut self, table: &str, matcher: &Condition) -> Result<Option<Record>, DataError> {
        let t = self.resolve(table)?;
        let found = self.fetch_first(&t, matcher)?;
        Ok(self.after_find(&t, found.into_iter().collect())?.into_iter().next())
    }

    fn count_inner(&mut self, table: &str, query: &FindQuery) -> Result<u64, DataError> {
        let t = self.resolve(table)?;
        let statement = StatementBuilder::new(&t.qualified, &t.columns, &self.config)
            .count(query.condition.as_ref())?;
        let row = self.run(&statement)?.into_rows().into_iter().next();

        let count = row
            .map(Record::from_row)
            .and_then(|r| r.get("count").and_then(Value::as_i64))
            .ok_or_else(|| DriverError::new("count query returned no count").with_sql(statement.sql))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn find_raw_inner(
        &mut self,
        table: &str,
        sql: &str,
        params: Vec<BoundParam>,
    ) -> Result<Vec<Record>, DataError> {
        let t = self.resolve(table)?;
        RawQueryGate::new(&self.config.blocked_tables, &self.config.table_prefix).check(sql, &t.short)?;

        let statement = Statement::checked(sql.to_string(), params, self.config.dialect)?;
        let rows = self.run(&statement)?.into_rows();
        let records = rows.into_iter().map(Record::from_row).collect();
        self.after_find(&t, records)
    }

    fn reset_association_inner(
        &mut self,
        spec: &AssociationSpec,
        owner: Value,
        targets: impl IntoIterator<Item = Value>,
    ) -> Result<AssociationOutcome, DataError> {
        let key = format!("{}:{}", sanitize_identifier(&spec.link_table), owner);
        let Some(lease) = self.locks.try_acquire(key.as_str(), self.config.lock_ttl) else {
            info!(lease = %key, "association is being reset elsewhere, skipping");
            return Ok(AssociationOutcome::Skipped);
        };

        let mut unique: Vec<Value> = Vec::new();
        for target in targets {
            if !target.is_null() && !unique.contains(&target) {
                unique.push(target);
            }
        }

        lease.ensure_live()?;
        let removed = self.delete_inner(
            &spec.link_table,
            &Condition::eq(spec.owner_column.as_str(), owner.clone()),
        )?;

        let mut linked = 0;
        for target in unique {
            lease.ensure_live()?;
            let link = Record::new()
                .with(spec.owner_column.as_str(), owner.clone())
                .with(spec.target_column.as_str(), target);
            self.create_inner(&spec.link_table, link, WriteOptions::maintenance().strict())?;
            linked += 1;
        }

        if !lease.release() {
            warn!(lease = %key, "lease expired before release");
        }
        Ok(AssociationOutcome::Applied { removed, linked })
    }
}

impl<D: Driver + std::fmt::Debug> std::fmt::Debug for DataLayer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLayer")
            .field("driver", &self.driver)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn report<T>(result: Result<T, DataError>) -> DataResult<T> {
    result.map_err(|err| {
        match &err {
            DataError::Driver(_) | DataError::SecurityRejection(_) => {
                warn!(error = %err, code = %err.code(), "operation failed")
            }
            _ => debug!(error = %err, code = %err.code(), "operation failed"),
        }
        ErrorEnvelope::from(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{RawRow, RawValue};
    use crate::error::ErrorCode;
    use std::collections::{HashMap, VecDeque};

    /// Records every statement and answers from a script.
    #[derive(Debug, Default)]
    struct ScriptedDriver {
        tables: HashMap<String, Vec<String>>,
        responses: VecDeque<Result<Execution, DriverError>>,
        executed: Vec<(String, Vec<BoundParam>)>,
    }

    impl ScriptedDriver {
        fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
            self.tables
                .insert(name.to_string(), columns.iter().map(|c| c.to_string()).collect());
            self
        }

        fn respond(mut self, response: Result<Execution, DriverError>) -> Self {
            self.responses.push_back(response);
            self
        }
    }

    impl Driver for ScriptedDriver {
        type Statement = (String, Vec<BoundParam>);

        fn prepare(&mut self, sql: &str, params: &[BoundParam]) -> Result<Self::Statement, DriverError> {
            Ok((sql.to_string(), params.to_vec()))
        }

        fn execute(&mut self, statement: Self::Statement) -> Result<Execution, DriverError> {
            self.executed.push(statement);
            self.responses
                .pop_front()
                .unwrap_or(Ok(Execution::Affected {
                    count: 0,
                    last_insert_id: None,
                }))
        }

        fn last_error(&self) -> Option<String> {
            None
        }

        fn introspect_columns(&mut self, table: &str) -> Result<Vec<String>, DriverError> {
            Ok(self.tables.get(table).cloned().unwrap_or_default())
        }
    }

    fn product_row(id: i64, title: &str) -> RawRow {
        RawRow::from_pairs([
            ("id", RawValue::Integer(id)),
            ("title", RawValue::Text(title.to_string())),
        ])
    }

    fn layer(driver: ScriptedDriver, hooks: HookRegistry) -> DataLayer<ScriptedDriver> {
        DataLayer::new(driver, Arc::new(hooks), Arc::new(DataLayerConfig::default())).unwrap()
    }

    fn products() -> ScriptedDriver {
        ScriptedDriver::default().with_table("products", &["id", "title", "price"])
    }

    #[test]
    fn test_before_update_abort_executes_nothing() {
        let hooks = HookRegistry::builder()
            .register_hook("products", HookStage::BeforeUpdate, |_r, _c| {
                Err(ErrorEnvelope::custom("frozen", "catalog is frozen"))
            })
            .build();
        let mut layer = layer(products(), hooks);

        let err = layer
            .update("products", Record::new().with("title", "x"), &Condition::eq("id", 1))
            .unwrap_err();
        assert_eq!(err.code, "frozen");
        assert_eq!(err.data["hook_stage"], "before_update");
        assert!(layer.driver().executed.is_empty());
    }

    #[test]
    fn test_find_consumes_handle_state() {
        let mut layer = layer(products(), HookRegistry::empty());
        layer.table("products").unwrap().limit(2).offset(2);

        layer.find("products", FindQuery::new()).unwrap();
        layer.find("products", FindQuery::new()).unwrap();

        let executed = &layer.driver().executed;
        assert!(executed[0].0.ends_with("LIMIT 2,2"));
        assert!(executed[1].0.ends_with("LIMIT 0,100"));
    }

    #[test]
    fn test_after_find_runs_per_record() {
        let hooks = HookRegistry::builder()
            .register_hook("products", HookStage::AfterFind, |mut r, _c| {
                r.set("seen", true);
                Ok(r)
            })
            .build();
        let driver = products().respond(Ok(Execution::Rows(vec![
            product_row(1, "a"),
            product_row(2, "b"),
        ])));
        let mut layer = layer(driver, hooks);

        let records = layer.find("products", FindQuery::new()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.get("seen") == Some(&Value::Bool(true))));
    }

    #[test]
    fn test_upsert_conflict_writes_nothing() {
        let driver = products().respond(Ok(Execution::Rows(vec![
            product_row(1, "dup"),
            product_row(2, "dup"),
        ])));
        let mut layer = layer(driver, HookRegistry::empty());

        let err = layer
            .upsert(
                "products",
                Record::new().with("title", "dup"),
                Some(&Condition::eq("title", "dup")),
            )
            .unwrap_err();
        assert!(err.is(ErrorCode::DuplicateConflict));
        assert_eq!(err.data["matches"], 2);
        assert_eq!(layer.driver().executed.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_unusable_match() {
        let mut layer = layer(products(), HookRegistry::empty());
        let err = layer
            .upsert(
                "products",
                Record::new().with("title", "x"),
                Some(&Condition::eq("ghost", 1)),
            )
            .unwrap_err();
        assert!(err.is(ErrorCode::Validation));
        assert!(layer.driver().executed.is_empty());
    }

    #[test]
    fn test_upsert_without_match_inserts() {
        let mut layer = layer(products(), HookRegistry::empty());
        layer
            .upsert("products", Record::new().with("title", "new"), None)
            .unwrap();
        assert!(layer.driver().executed[0].0.starts_with("INSERT INTO products"));
    }

    #[test]
    fn test_delete_hooks_see_pinned_fields() {
        let hooks = HookRegistry::builder()
            .register_hook("products", HookStage::BeforeDelete, |r, _c| {
                if r.get("id") == Some(&Value::Int(1)) {
                    Err(ErrorEnvelope::custom("protected", "row 1 is protected"))
                } else {
                    Ok(r)
                }
            })
            .build();
        let mut layer = layer(products(), hooks);

        assert!(layer.delete("products", &Condition::eq("id", 1)).is_err());
        assert!(layer.delete("products", &Condition::eq("id", 2)).is_ok());
        assert_eq!(layer.driver().executed.len(), 1);
    }

    #[test]
    fn test_raw_gate_rejects_before_execution() {
        let mut layer = layer(products(), HookRegistry::empty());
        let err = layer
            .find_raw("products", "UPDATE products SET title = 'x'", Vec::new())
            .unwrap_err();
        assert!(err.is(ErrorCode::SecurityRejection));
        assert_eq!(err.status, 403);
        assert!(layer.driver().executed.is_empty());
    }

    #[test]
    fn test_raw_on_unknown_table_executes_nothing() {
        let mut layer = layer(products(), HookRegistry::empty());
        let err = layer
            .find_raw("ghosts", "SELECT * FROM ghosts", Vec::new())
            .unwrap_err();
        assert!(err.is(ErrorCode::Configuration));
        assert!(layer.driver().executed.is_empty());
    }

    #[test]
    fn test_find_one_takes_lowest_id() {
        let driver = products().respond(Ok(Execution::Rows(vec![product_row(1, "a")])));
        let mut layer = layer(driver, HookRegistry::empty());

        let found = layer
            .find_one("products", &Condition::simple("id", ">", 0))
            .unwrap()
            .unwrap();
        assert_eq!(found.get("id"), Some(&Value::Int(1)));
        assert_eq!(
            layer.driver().executed[0].0,
            "SELECT * FROM products WHERE id > ? ORDER BY id ASC LIMIT 0,1"
        );
    }

    #[test]
    fn test_registered_table_skips_introspection() {
        let mut layer = layer(ScriptedDriver::default(), HookRegistry::empty());
        layer
            .register_table("products", ColumnSet::new(["id", "title"]))
            .unwrap();

        layer
            .find("products", FindQuery::new().filter(Condition::eq("title", "a")))
            .unwrap();
        assert_eq!(
            layer.driver().executed[0].0,
            "SELECT * FROM products WHERE title = ? ORDER BY id DESC LIMIT 0,100"
        );
    }

    #[test]
    fn test_driver_error_is_normalized() {
        let driver = products().respond(Err(DriverError::new("database is locked")));
        let mut layer = layer(driver, HookRegistry::empty());

        let err = layer.find("products", FindQuery::new()).unwrap_err();
        assert!(err.is(ErrorCode::Driver));
        assert_eq!(err.status, 500);
        assert!(err.data["sql"].as_str().unwrap().starts_with("SELECT"));
    }

    #[test]
    fn test_get_count() {
        let driver = products().respond(Ok(Execution::Rows(vec![RawRow::from_pairs([(
            "count",
            RawValue::Integer(7),
        )])])));
        let mut layer = layer(driver, HookRegistry::empty());
        assert_eq!(layer.get_count("products", &FindQuery::new()).unwrap(), 7);
    }

    #[test]
    fn test_unknown_table_is_configuration_error() {
        let mut layer = layer(products(), HookRegistry::empty());
        let err = layer.create("ghosts", Record::new().with("a", 1)).unwrap_err();
        assert!(err.is(ErrorCode::Configuration));
    }

    #[test]
    fn test_association_skipped_while_leased() {
        let driver = ScriptedDriver::default().with_table("product_tags", &["product_id", "tag_id"]);
        let mut layer = layer(driver, HookRegistry::empty());
        let spec = AssociationSpec::new("product_tags", "product_id", "tag_id");

        let held = layer
            .locks()
            .try_acquire("product_tags:5", std::time::Duration::from_secs(60))
            .unwrap();
        let outcome = layer
            .reset_association(&spec, 5, [Value::Int(1)])
            .unwrap();
        assert_eq!(outcome, AssociationOutcome::Skipped);
        assert!(layer.driver().executed.is_empty());

        drop(held);
        let outcome = layer
            .reset_association(&spec, 5, [Value::Int(1), Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(outcome, AssociationOutcome::Applied { removed: 0, linked: 2 });
        assert_eq!(layer.driver().executed.len(), 3);
        assert!(!layer.locks().is_held("product_tags:5"));
    }
}
