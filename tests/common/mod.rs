//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tabula::prelude::*;
use tabula::sqlite::SqliteDriver;

pub const SCHEMA: &str = "
    CREATE TABLE products (
        id INTEGER PRIMARY KEY,
        title TEXT,
        slug TEXT,
        price REAL,
        meta TEXT,
        created TEXT,
        modified TEXT
    );
    CREATE TABLE product_tags (
        id INTEGER PRIMARY KEY,
        product_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL
    );
    CREATE TABLE users (id INTEGER PRIMARY KEY, login TEXT, password TEXT);
";

/// An in-memory driver with the fixture schema.
pub fn driver() -> SqliteDriver {
    let mut driver = SqliteDriver::memory().unwrap();
    driver.execute_batch(SCHEMA).unwrap();
    driver
}

/// A layer with the given hooks and default configuration.
pub fn layer_with(hooks: HookRegistry) -> DataLayer<SqliteDriver> {
    DataLayer::new(driver(), Arc::new(hooks), Arc::new(DataLayerConfig::default())).unwrap()
}

/// A layer with no hooks.
pub fn layer() -> DataLayer<SqliteDriver> {
    layer_with(HookRegistry::empty())
}

/// Insert products titled `product 1..=n`.
pub fn seed(layer: &mut DataLayer<SqliteDriver>, n: i64) {
    for i in 1..=n {
        layer
            .create(
                "products",
                Record::new()
                    .with("title", format!("product {i}"))
                    .with("price", i * 10),
            )
            .unwrap();
    }
}

/// Read the ids of all rows in `table`, ascending.
pub fn ids(layer: &mut DataLayer<SqliteDriver>, table: &str) -> Vec<i64> {
    layer
        .find(table, FindQuery::new().order_by("id", SortOrder::Asc))
        .unwrap()
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect()
}
