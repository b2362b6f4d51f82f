mod common;
use common::{configurable, grouped, harness, simple, variant};

use catalog_sync::CatalogError;
use catalog_sync::config::StockConfig;
use catalog_sync::events::CatalogEvent;
use catalog_sync::feed::{FeedSnapshot, RawStock};
use catalog_sync::stock::StockLedger;
use catalog_sync::store::stock;

fn stock_changed(events: &[CatalogEvent]) -> Vec<(String, bool, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            CatalogEvent::StockChanged {
                sku,
                status_changed,
                low_stock,
            } => Some((sku.clone(), *status_changed, *low_stock)),
            _ => None,
        })
        .collect()
}

#[test]
fn identical_writes_are_not_changes() {
    let mut h = harness();
    h.sync(vec![simple("A")]);
    h.drain_events();
    let ledger = StockLedger::new(&h.locks, &h.sink, &StockConfig::default());

    assert!(ledger.set_stock(&mut h.conn, "A", 0, false).unwrap());
    assert!(!ledger.set_stock(&mut h.conn, "A", 0, false).unwrap());
    assert!(ledger.set_stock(&mut h.conn, "A", 5, true).unwrap());

    let events = stock_changed(&h.drain_events());
    assert_eq!(
        events,
        vec![
            ("A".to_string(), false, false),
            ("A".to_string(), true, false),
        ]
    );
    let rec = stock::find_stock(&mut h.conn, "A").unwrap().unwrap();
    assert_eq!((rec.quantity, rec.in_stock), (5, true));
}

#[test]
fn transitions_and_low_stock_are_flagged() {
    let mut h = harness();
    h.sync(vec![simple("A")]);
    h.drain_events();
    let ledger = StockLedger::new(&h.locks, &h.sink, &StockConfig { low_stock_threshold: 5 });

    ledger.set_stock(&mut h.conn, "A", 10, true).unwrap(); // new record, in stock
    ledger.set_stock(&mut h.conn, "A", 3, true).unwrap(); // low, same status
    ledger.set_stock(&mut h.conn, "A", 0, true).unwrap(); // crossed zero while in stock
    ledger.set_stock(&mut h.conn, "A", 0, false).unwrap(); // flag flip

    let events = stock_changed(&h.drain_events());
    assert_eq!(
        events,
        vec![
            ("A".to_string(), true, false),
            ("A".to_string(), false, true),
            ("A".to_string(), true, true),
            ("A".to_string(), true, false),
        ]
    );
}

#[test]
fn unknown_sku_is_not_found() {
    let mut h = harness();
    let ledger = StockLedger::new(&h.locks, &h.sink, &StockConfig::default());
    let err = ledger.set_stock(&mut h.conn, "GHOST", 1, true).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "{err}");
    assert!(!ledger.is_in_stock(&mut h.conn, "GHOST").unwrap());
}

#[test]
fn composite_is_in_stock_when_any_child_has_quantity() {
    let mut h = harness();
    h.sync(vec![
        variant("C-1", &[("size", "S")]),
        variant("C-2", &[("size", "M")]),
        variant("C-3", &[("size", "L")]),
        configurable("C", &[("size", &["S", "M", "L"])], &["C-1", "C-2", "C-3"]),
        simple("G-1"),
        grouped("G", &["G-1"]),
    ]);
    let ledger = StockLedger::new(&h.locks, &h.sink, &StockConfig::default());

    ledger.set_stock(&mut h.conn, "C-1", 0, true).unwrap();
    ledger.set_stock(&mut h.conn, "C-2", 0, true).unwrap();
    ledger.set_stock(&mut h.conn, "C-3", 0, true).unwrap();
    // The parent's own record does not matter.
    ledger.set_stock(&mut h.conn, "C", 100, true).unwrap();
    assert!(!ledger.is_in_stock(&mut h.conn, "C").unwrap());

    ledger.set_stock(&mut h.conn, "C-3", 3, false).unwrap();
    assert!(ledger.is_in_stock(&mut h.conn, "C").unwrap());
    assert!(!ledger.is_in_stock(&mut h.conn, "C-3").unwrap());

    assert!(!ledger.is_in_stock(&mut h.conn, "G").unwrap());
    ledger.set_stock(&mut h.conn, "G-1", 1, true).unwrap();
    assert!(ledger.is_in_stock(&mut h.conn, "G").unwrap());
    assert!(ledger.is_in_stock(&mut h.conn, "G-1").unwrap());
}

#[test]
fn feed_pushes_accept_legacy_shapes() {
    let mut h = harness();
    h.sync(vec![simple("A"), simple("B")]);
    let ledger = StockLedger::new(&h.locks, &h.sink, &StockConfig::default());

    let push: RawStock = serde_json::from_str(r#"{"sku": "A", "qty": 2.9, "status": 1}"#).unwrap();
    assert!(ledger.apply(&mut h.conn, &push).unwrap());
    let rec = stock::find_stock(&mut h.conn, "A").unwrap().unwrap();
    assert_eq!((rec.quantity, rec.in_stock), (2, true));

    let feed = FeedSnapshot::from_json_str(
        r#"{"stock": [{"sku": "B", "quantity": 7, "is_in_stock": true}]}"#,
    )
    .unwrap();
    assert!(ledger.refresh_from(&mut h.conn, &feed, "B").unwrap());
    assert!(!ledger.refresh_from(&mut h.conn, &feed, "B").unwrap());
}
