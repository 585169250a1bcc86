//! Integration tests for create, update, delete, find and count.
//!
//! These run the full pipeline against an in-memory SQLite database.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use tabula::prelude::*;
use tabula::{Select, WriteOptions};

#[test]
fn test_create_returns_stored_row() {
    let mut layer = common::layer();
    let stored = layer
        .create("products", Record::new().with("title", "socks").with("price", 12.5))
        .unwrap();

    assert_eq!(stored.get("id"), Some(&Value::Int(1)));
    assert_eq!(stored.get("title"), Some(&Value::Text("socks".into())));
    assert!(stored.get("created").is_some_and(|v| !v.is_null()));
    assert_eq!(stored.get("created"), stored.get("modified"));
}

#[test]
fn test_unknown_columns_are_dropped() {
    let mut layer = common::layer();
    let stored = layer
        .create(
            "products",
            Record::new().with("title", "socks").with("secret_col", "x"),
        )
        .unwrap();
    assert!(!stored.contains("secret_col"));

    let err = layer
        .update_with(
            "products",
            Record::new().with("secret_col", "x"),
            &Condition::eq("id", 1),
            WriteOptions::default().strict(),
        )
        .unwrap_err();
    assert!(err.is(ErrorCode::SecurityRejection));
}

#[test]
fn test_pagination_window() {
    let mut layer = common::layer();
    common::seed(&mut layer, 5);

    let page = layer
        .find(
            "products",
            FindQuery::new()
                .order_by("id", SortOrder::Asc)
                .limit(2)
                .offset(2),
        )
        .unwrap();
    let ids: Vec<_> = page.iter().filter_map(|r| r.get("id").and_then(Value::as_i64)).collect();
    assert_eq!(ids, vec![3, 4]);
}

#[test]
fn test_handle_state_applies_once() {
    let mut layer = common::layer();
    common::seed(&mut layer, 5);

    layer
        .table("products")
        .unwrap()
        .order_by("id", SortOrder::Asc)
        .limit(1)
        .select(Select::columns(["id", "title"]));
    let first = layer.find("products", FindQuery::new()).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].len(), 2);
    assert_eq!(first[0].get("id"), Some(&Value::Int(1)));

    // Defaults again: id DESC, every column.
    let all = layer.find("products", FindQuery::new()).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].get("id"), Some(&Value::Int(5)));
}

#[test]
fn test_unknown_order_column_falls_back() {
    let mut layer = common::layer();
    common::seed(&mut layer, 3);
    let rows = layer
        .find("products", FindQuery::new().order_by("nope; DROP TABLE products", SortOrder::Asc))
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_or_group_with_search() {
    let mut layer = common::layer();
    common::seed(&mut layer, 3);
    layer
        .create("products", Record::new().with("title", "wool socks").with("price", 5))
        .unwrap();

    let filter = Condition::or([
        Condition::simple("price", ">", 25),
        Condition::search("title", "socks"),
    ]);
    let mut found = layer.find("products", FindQuery::new().filter(filter)).unwrap();
    found.sort_by_key(|r| r.get("id").and_then(Value::as_i64));

    let titles: Vec<_> = found
        .iter()
        .filter_map(|r| r.get("title").and_then(Value::as_str))
        .collect();
    assert_eq!(titles, vec!["product 3", "wool socks"]);
}

#[test]
fn test_search_escapes_wildcards() {
    let mut layer = common::layer();
    layer.create("products", Record::new().with("title", "100% wool")).unwrap();
    layer.create("products", Record::new().with("title", "100 wool")).unwrap();

    let found = layer
        .find("products", FindQuery::new().filter(Condition::search("title", "100%")))
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn test_in_lists() {
    let mut layer = common::layer();
    common::seed(&mut layer, 5);

    let found = layer
        .find("products", FindQuery::new().filter(Condition::in_list("id", [2, 4])))
        .unwrap();
    assert_eq!(found.len(), 2);

    let none = layer
        .find(
            "products",
            FindQuery::new().filter(Condition::in_list("id", Vec::<Value>::new())),
        )
        .unwrap();
    assert!(none.is_empty());

    let rest = layer
        .get_count("products", &FindQuery::new().filter(Condition::not_in("id", [1, 2])))
        .unwrap();
    assert_eq!(rest, 3);
}

#[test]
fn test_update_changes_matching_rows() {
    let mut layer = common::layer();
    common::seed(&mut layer, 2);

    let updated = layer
        .update(
            "products",
            Record::new().with("price", 99).with("id", 42),
            &Condition::eq("id", 2),
        )
        .unwrap();
    assert_eq!(updated.get("id"), Some(&Value::Int(2)));
    assert_eq!(updated.get("price").and_then(Value::as_i64), Some(99));

    let untouched = layer.find_one("products", &Condition::eq("id", 1)).unwrap().unwrap();
    assert_eq!(untouched.get("price").and_then(Value::as_i64), Some(10));
}

#[test]
fn test_update_requires_usable_match() {
    let mut layer = common::layer();
    common::seed(&mut layer, 2);

    let err = layer
        .update("products", Record::new().with("price", 1), &Condition::eq("ghost", 1))
        .unwrap_err();
    assert!(err.is(ErrorCode::Validation));
    assert_eq!(err.data["field"], "match");

    let prices: Vec<_> = layer
        .find("products", FindQuery::new())
        .unwrap()
        .iter()
        .filter_map(|r| r.get("price").and_then(Value::as_i64))
        .collect();
    assert!(!prices.contains(&1));
}

#[test]
fn test_delete() {
    let mut layer = common::layer();
    common::seed(&mut layer, 3);

    layer.delete("products", &Condition::eq("id", 2)).unwrap();
    assert_eq!(common::ids(&mut layer, "products"), vec![1, 3]);

    let err = layer
        .delete("products", &Condition::and(Vec::new()))
        .unwrap_err();
    assert!(err.is(ErrorCode::Validation));
    assert_eq!(common::ids(&mut layer, "products"), vec![1, 3]);
}

#[test]
fn test_delete_not_in_with_null_removes_nothing() {
    let mut layer = common::layer();
    common::seed(&mut layer, 5);

    let err = layer
        .delete("products", &Condition::not_in("id", [Value::Null]))
        .unwrap_err();
    assert!(err.is(ErrorCode::Validation));

    let err = layer
        .delete(
            "products",
            &Condition::not_in("id", [Value::Int(1), Value::Json("{}".into())]),
        )
        .unwrap_err();
    assert!(err.is(ErrorCode::Validation));
    assert_eq!(common::ids(&mut layer, "products"), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_find_one_and_count() {
    let mut layer = common::layer();
    common::seed(&mut layer, 4);

    assert!(layer.find_one("products", &Condition::eq("id", 9)).unwrap().is_none());
    let found = layer
        .find_one("products", &Condition::eq("title", "product 3"))
        .unwrap()
        .unwrap();
    assert_eq!(found.get("id"), Some(&Value::Int(3)));

    assert_eq!(layer.get_count("products", &FindQuery::new()).unwrap(), 4);
    let filtered = FindQuery::new().filter(Condition::simple("price", ">=", "20"));
    assert_eq!(layer.get_count("products", &filtered).unwrap(), 3);
}

#[test]
fn test_null_round_trip() {
    let mut layer = common::layer();
    layer
        .create("products", Record::new().with("title", "bare").with("meta", Value::Null))
        .unwrap();
    layer
        .create("products", Record::new().with("title", "dressed").with("meta", "x"))
        .unwrap();

    let bare = layer
        .find("products", FindQuery::new().filter(Condition::eq("meta", Value::Null)))
        .unwrap();
    assert_eq!(bare.len(), 1);
    assert_eq!(bare[0].get("meta"), Some(&Value::Null));

    let dressed = layer
        .find(
            "products",
            FindQuery::new().filter(Condition::simple("meta", "!=", Value::Null)),
        )
        .unwrap();
    assert_eq!(dressed.len(), 1);
}

#[test]
fn test_set_null_clears_column() {
    let mut layer = common::layer();
    layer
        .create("products", Record::new().with("title", "scarf").with("meta", "x"))
        .unwrap();

    let mut patch = Record::new();
    patch.set_null("meta");
    let updated = layer.update("products", patch, &Condition::eq("id", 1)).unwrap();
    assert_eq!(updated.get("meta"), Some(&Value::Null));

    let cleared = layer
        .get_count("products", &FindQuery::new().filter(Condition::eq("meta", Value::Null)))
        .unwrap();
    assert_eq!(cleared, 1);
}

#[test]
fn test_find_one_returns_lowest_id() {
    let mut layer = common::layer();
    common::seed(&mut layer, 3);

    let first = layer
        .find_one("products", &Condition::simple("id", ">", 0))
        .unwrap()
        .unwrap();
    assert_eq!(first.get("id"), Some(&Value::Int(1)));
}

#[test]
fn test_json_passes_through_unescaped() {
    let mut layer = common::layer();
    let input = json!({"title": "scarf", "meta": {"color": "red", "sizes": [1, 2]}});
    let record = Record::from_json(input.as_object().unwrap().clone()).unwrap();

    let stored = layer.create("products", record).unwrap();
    let meta = stored.get("meta").unwrap();
    assert!(matches!(meta, Value::Json(_)));

    let raw = layer
        .find_raw("products", "SELECT meta FROM products WHERE id = ?", vec![BoundParam::new(
            tabula::PlaceholderKind::Integer,
            1,
        )])
        .unwrap();
    let text = match raw[0].get("meta") {
        Some(Value::Json(text)) => text.clone(),
        other => panic!("unexpected meta: {other:?}"),
    };
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json!({"color": "red", "sizes": [1, 2]}));
    assert_eq!(stored.to_json()["meta"]["color"], "red");
}

#[test]
fn test_missing_table_is_reported() {
    let mut layer = common::layer();
    let err = layer.create("ghosts", Record::new().with("title", "boo")).unwrap_err();
    assert!(err.is(ErrorCode::Configuration));
    assert_eq!(err.status, 500);
}

#[test]
fn test_driver_failure_is_wrapped() {
    let mut layer = common::layer();
    // NOT NULL violation on the link table.
    let err = layer
        .create("product_tags", Record::new().with("product_id", 1))
        .unwrap_err();
    assert!(err.is(ErrorCode::Driver));
    assert!(err.message.contains("NOT NULL"));
    assert!(err.data["sql"].as_str().unwrap().starts_with("INSERT INTO product_tags"));
}
