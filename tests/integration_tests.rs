//! Integration tests for the complete recordkit pipeline
//!
//! These tests run end to end across crates:
//! - schema document → resolver → marshaler → memory store
//! - marshal configuration → date formats and parallelism
//! - custom seams layered over the default behavior
//!
//! Run with: cargo test --test integration_tests

use chrono::{TimeZone, Utc};
use rayon::prelude::*;
use recordkit_marshal::{
    DefaultValueSetter, MarshalConfig, MarshalContext, MarshalError, Marshaler, Resolver,
    TransformRegistry, ValueSetter,
};
use recordkit_schema::{AttributeDescription, AttributeValue, Schema};
use recordkit_store::{MemoryStore, RecordId, RecordStore};
use serde_json::{json, Value};

const SHOP: &str = r#"{
    "entities": [
        {
            "name": "Order",
            "primary_key": "number",
            "attributes": [
                { "name": "number", "type": "string", "key_paths": ["number", "meta.number"] },
                { "name": "placed", "type": "date", "date_format": "day" },
                { "name": "paid", "type": "boolean" },
                { "name": "total", "type": "float" },
                { "name": "notes", "type": "transformable", "transformer": "json_string" },
                { "name": "signature", "type": "binary" }
            ],
            "relationships": [
                { "name": "lines", "destination": "Line", "cardinality": "to_many", "delete_rule": "cascade", "inverse": "order" },
                { "name": "customer", "destination": "Customer", "cardinality": "to_one", "inverse": "orders" },
                { "name": "receipt", "destination": "Receipt", "cardinality": "to_one", "delete_rule": "cascade" }
            ]
        },
        {
            "name": "Line",
            "primary_key": "position",
            "attributes": [
                { "name": "position", "type": "integer" },
                { "name": "sku", "type": "string" },
                { "name": "quantity", "type": "integer", "key_paths": ["qty", "quantity"] }
            ],
            "relationships": [
                { "name": "order", "destination": "Order", "cardinality": "to_one", "inverse": "lines", "primary_key": true }
            ]
        },
        {
            "name": "Customer",
            "primary_key": "email",
            "attributes": [
                { "name": "email", "type": "string" },
                { "name": "name", "type": "string", "key_paths": ["name", "profile.display_name"] }
            ],
            "relationships": [
                { "name": "orders", "destination": "Order", "cardinality": "to_many", "inverse": "customer" }
            ]
        },
        {
            "name": "Receipt",
            "attributes": [{ "name": "url", "type": "string" }]
        }
    ]
}"#;

const CONFIG: &str = r#"{ "date_formats": { "day": "yyyy-MM-dd" } }"#;

fn shop() -> Schema {
    Schema::from_json_str(SHOP).expect("shop schema")
}

fn marshaler() -> Marshaler {
    Marshaler::from_config(&MarshalConfig::from_json_str(CONFIG).expect("config"))
}

fn attr(store: &MemoryStore, record: RecordId, name: &str) -> Option<AttributeValue> {
    store.attribute(record, name).expect("known record")
}

fn order(number: &str, customer: &str, lines: usize) -> Value {
    json!({
        "number": number,
        "placed": "2024-03-01",
        "paid": "yes",
        "total": "19.90",
        "notes": "{\"gift\": true}",
        "signature": [1, 2, 3],
        "customer": {"email": customer, "profile": {"display_name": customer.to_uppercase()}},
        "lines": (1..=lines)
            .map(|p| json!({"position": p, "sku": format!("SKU-{p}"), "qty": "2"}))
            .collect::<Vec<_>>(),
        "receipt": {"url": format!("https://receipts.example/{number}")}
    })
}

// ============================================================================
// End-to-end marshaling
// ============================================================================

#[test]
fn test_order_graph_is_populated() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();

    let report = Resolver::new(&schema, &store, &marshaler)
        .marshal("Order", &[order("A-1", "ada@example.com", 2)])
        .expect("marshal");
    assert!(report.is_clean(), "{:?}", report.failures);

    let order = report.roots[0];
    assert_eq!(attr(&store, order, "number"), Some("A-1".into()));
    assert_eq!(
        attr(&store, order, "placed"),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().into())
    );
    assert_eq!(attr(&store, order, "paid"), Some(true.into()));
    assert_eq!(attr(&store, order, "total"), Some(19.9.into()));
    assert_eq!(
        attr(&store, order, "notes"),
        Some(AttributeValue::Opaque(json!({"gift": true})))
    );
    assert_eq!(attr(&store, order, "signature"), Some(AttributeValue::Binary(vec![1, 2, 3])));

    let lines = store.to_many(order, "lines").unwrap();
    assert_eq!(lines.len(), 2);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(store.to_one(*line, "order").unwrap(), Some(order));
        assert_eq!(attr(&store, *line, "position"), Some(AttributeValue::Integer(i as i64 + 1)));
        assert_eq!(attr(&store, *line, "quantity"), Some(AttributeValue::Integer(2)));
    }

    let customer = store.to_one(order, "customer").unwrap().expect("customer");
    assert_eq!(attr(&store, customer, "name"), Some("ADA@EXAMPLE.COM".into()));
    assert_eq!(store.to_many(customer, "orders").unwrap(), vec![order]);
}

#[test]
fn test_remarshal_updates_in_place_and_cascades_replaced_receipt() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();
    let resolver = Resolver::new(&schema, &store, &marshaler);

    let first = resolver.marshal("Order", &[order("A-1", "ada@example.com", 1)]).unwrap();
    let old_receipt = store.to_one(first.roots[0], "receipt").unwrap().expect("receipt");

    let mut update = order("A-1", "ada@example.com", 3);
    update["paid"] = json!(false);
    let second = resolver.marshal("Order", &[update]).unwrap();

    assert_eq!(first.roots, second.roots);
    assert_eq!(store.records_of("Order").len(), 1);
    assert_eq!(store.records_of("Customer").len(), 1);
    assert_eq!(store.records_of("Line").len(), 3);
    assert_eq!(attr(&store, second.roots[0], "paid"), Some(false.into()));

    // Receipts carry no key, so the update brought a new one and the old one is gone.
    let new_receipt = store.to_one(second.roots[0], "receipt").unwrap().expect("receipt");
    assert_ne!(old_receipt, new_receipt);
    assert!(!store.contains(old_receipt));
    assert_eq!(store.records_of("Receipt"), vec![new_receipt]);
}

#[test]
fn test_customer_orders_accumulate_across_batches() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();
    let resolver = Resolver::new(&schema, &store, &marshaler).parallel(false);

    let a = resolver.marshal("Order", &[order("A-1", "ada@example.com", 1)]).unwrap();
    let b = resolver.marshal("Order", &[order("A-2", "ada@example.com", 1)]).unwrap();

    let customer = store.records_of("Customer")[0];
    assert_eq!(
        store.to_many(customer, "orders").unwrap(),
        vec![a.roots[0], b.roots[0]]
    );
}

#[test]
fn test_nested_key_path_identity() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();
    let resolver = Resolver::new(&schema, &store, &marshaler);

    let first = resolver.marshal("Order", &[json!({"meta": {"number": "B-9"}})]).unwrap();
    let second = resolver.marshal("Order", &[json!({"number": "B-9", "paid": 1})]).unwrap();

    assert_eq!(first.roots, second.roots);
    assert_eq!(attr(&store, first.roots[0], "number"), Some("B-9".into()));
    assert_eq!(attr(&store, first.roots[0], "paid"), Some(true.into()));
}

#[test]
fn test_orphan_lines_fail_without_blocking_orders() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();
    let resolver = Resolver::new(&schema, &store, &marshaler);

    let report = resolver
        .marshal(
            "Line",
            &[
                json!({"position": 1, "sku": "LOOSE"}),
                json!({"position": 2, "sku": "OK", "order": {"number": "C-3"}}),
            ],
        )
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.is_integrity_failure());
    let order = store.to_one(report.roots[1], "order").unwrap().expect("order");
    assert_eq!(attr(&store, order, "number"), Some("C-3".into()));
    assert_eq!(attr(&store, report.roots[0], "sku"), Some("LOOSE".into()));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_independent_batches_share_one_store_across_threads() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler();

    let reports: Vec<_> = (0..8)
        .into_par_iter()
        .map(|i| {
            Resolver::new(&schema, &store, &marshaler)
                .marshal("Order", &[order(&format!("P-{i}"), &format!("c{i}@example.com"), 3)])
                .expect("marshal")
        })
        .collect();

    assert!(reports.iter().all(|r| r.is_clean()));
    assert_eq!(store.records_of("Order").len(), 8);
    assert_eq!(store.records_of("Line").len(), 24);
    for report in &reports {
        assert_eq!(store.to_many(report.roots[0], "lines").unwrap().len(), 3);
    }
}

// ============================================================================
// Seams and registries
// ============================================================================

/// Refuses to overwrite a value that is already set.
struct WriteOnce;

impl ValueSetter for WriteOnce {
    fn set_value(
        &self,
        cx: &MarshalContext<'_>,
        raw: &Value,
        record: RecordId,
        attribute: &AttributeDescription,
        date_format: &dyn recordkit_marshal::DateFormatStrategy,
    ) -> Result<(), MarshalError> {
        if cx.store().attribute(record, &attribute.name)?.is_some() {
            return Ok(());
        }
        DefaultValueSetter.set_value(cx, raw, record, attribute, date_format)
    }
}

#[test]
fn test_custom_value_setter_applies_through_resolver() {
    let schema = shop();
    let store = MemoryStore::new();
    let marshaler = marshaler().with_value_setter(WriteOnce);
    let resolver = Resolver::new(&schema, &store, &marshaler);

    let first = resolver.marshal("Order", &[json!({"number": "D-1", "total": 5})]).unwrap();
    resolver.marshal("Order", &[json!({"number": "D-1", "total": 7})]).unwrap();

    assert_eq!(attr(&store, first.roots[0], "total"), Some(5.0.into()));
}

#[test]
fn test_custom_transformer_replaces_builtin() {
    let schema = shop();
    let store = MemoryStore::new();
    let transforms = TransformRegistry::new().with_transformer("json_string", |raw: &Value| {
        raw.as_str().map(|s| AttributeValue::String(s.to_uppercase()))
    });
    let marshaler = marshaler().with_transforms(transforms);

    let report = Resolver::new(&schema, &store, &marshaler)
        .marshal("Order", &[json!({"number": "E-1", "notes": "fragile"})])
        .unwrap();

    assert_eq!(attr(&store, report.roots[0], "notes"), Some("FRAGILE".into()));
}
