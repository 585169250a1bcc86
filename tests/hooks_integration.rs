//! Integration tests for lifecycle hooks.

mod common;

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tabula::prelude::*;

#[test]
fn test_before_update_abort_leaves_row_unchanged() {
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::BeforeUpdate, |record, _ctx| {
            match record.get("price").and_then(Value::as_i64) {
                Some(price) if price < 0 => Err(ErrorEnvelope::custom(
                    "negative_price",
                    "price must not be negative",
                )
                .with_data("field", "price")),
                _ => Ok(record),
            }
        })
        .build();
    let mut layer = common::layer_with(hooks);
    common::seed(&mut layer, 1);

    let err = layer
        .update("products", Record::new().with("price", -5), &Condition::eq("id", 1))
        .unwrap_err();
    assert_eq!(err.code, "negative_price");
    assert_eq!(err.status, 400);
    assert_eq!(err.data["field"], "price");

    let row = layer.find_one("products", &Condition::eq("id", 1)).unwrap().unwrap();
    assert_eq!(row.get("price").and_then(Value::as_i64), Some(10));
}

#[test]
fn test_before_create_rewrites_record() {
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::BeforeCreate, |mut record, _ctx| {
            if !record.contains("slug") {
                let slug = record
                    .get("title")
                    .and_then(Value::as_str)
                    .map(|t| t.to_lowercase().replace(' ', "-"));
                if let Some(slug) = slug {
                    record.set("slug", slug);
                }
            }
            Ok(record)
        })
        .build();
    let mut layer = common::layer_with(hooks);

    let stored = layer
        .create("products", Record::new().with("title", "Blue Socks"))
        .unwrap();
    assert_eq!(stored.get("slug"), Some(&Value::Text("blue-socks".into())));
}

#[test]
fn test_wildcard_hooks_run_first() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let table_log = Arc::clone(&seen);
    let global_log = Arc::clone(&seen);
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::BeforeCreate, move |record, ctx| {
            table_log.lock().unwrap().push(format!("products:{}", ctx.stage));
            Ok(record)
        })
        .register_hook("*", HookStage::BeforeCreate, move |record, ctx| {
            global_log.lock().unwrap().push(format!("*:{}", ctx.table));
            Ok(record)
        })
        .build();
    let mut layer = common::layer_with(hooks);

    layer.create("products", Record::new().with("title", "x")).unwrap();
    layer
        .create("product_tags", Record::new().with("product_id", 1).with("tag_id", 2))
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "*:products".to_string(),
            "products:before_create".to_string(),
            "*:product_tags".to_string(),
        ]
    );
}

#[test]
fn test_after_create_failure_keeps_the_write() {
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::AfterCreate, |_record, _ctx| {
            Err(ErrorEnvelope::custom("index_unavailable", "search index is down"))
        })
        .build();
    let mut layer = common::layer_with(hooks);

    let err = layer
        .create("products", Record::new().with("title", "kept"))
        .unwrap_err();
    assert_eq!(err.code, "index_unavailable");
    assert_eq!(err.data["hook_stage"], "after_create");

    assert_eq!(layer.get_count("products", &FindQuery::new()).unwrap(), 1);
}

#[test]
fn test_before_delete_veto() {
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::BeforeDelete, |pinned, _ctx| {
            if pinned.get("id").is_some() {
                Ok(pinned)
            } else {
                Err(ErrorEnvelope::custom("bulk_delete", "delete by id only"))
            }
        })
        .build();
    let mut layer = common::layer_with(hooks);
    common::seed(&mut layer, 3);

    let err = layer
        .delete("products", &Condition::simple("price", ">", 5))
        .unwrap_err();
    assert_eq!(err.code, "bulk_delete");
    assert_eq!(common::ids(&mut layer, "products"), vec![1, 2, 3]);

    layer.delete("products", &Condition::eq("id", 3)).unwrap();
    assert_eq!(common::ids(&mut layer, "products"), vec![1, 2]);
}

#[test]
fn test_after_find_decorates_rows() {
    let hooks = HookRegistry::builder()
        .register_hook("products", HookStage::AfterFind, |mut record, _ctx| {
            let cents = record
                .get("price")
                .and_then(Value::as_i64)
                .map(|p| p * 100);
            if let Some(cents) = cents {
                record.set("price_cents", cents);
            }
            Ok(record)
        })
        .build();
    let mut layer = common::layer_with(hooks);
    common::seed(&mut layer, 2);

    let rows = layer.find("products", FindQuery::new()).unwrap();
    assert!(rows.iter().all(|r| r.contains("price_cents")));

    let one = layer.find_one("products", &Condition::eq("id", 1)).unwrap().unwrap();
    assert_eq!(one.get("price_cents"), Some(&Value::Int(1000)));
}
