#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use catalog_sync::db::{connection, migrate};
use catalog_sync::events::{CatalogEvent, ChannelSink};
use catalog_sync::feed::{
    RawAttribute, RawConfigurableOption, RawExtension, RawOptionValue, RawProduct, RawProductLink,
    StoreContext, VISIBILITY_NOT_VISIBLE,
};
use catalog_sync::lock::{LockManager, LockPolicy};
use catalog_sync::sync::{ProductSyncOptions, ProductSynchronizer, SyncResult};
use catalog_sync::variant::VariantResolver;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use serde_json::json;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    diesel::sql_query(format!("SELECT COUNT(*) AS n FROM {table}"))
        .get_result::<Count>(conn)
        .unwrap()
        .n
}

/// Short retry budget so contention tests finish quickly.
pub fn fast_policy() -> LockPolicy {
    LockPolicy {
        retry_interval: Duration::from_millis(10),
        max_attempts: Some(500),
        ..LockPolicy::default()
    }
}

pub fn en() -> StoreContext {
    StoreContext::new(1, "en")
}

pub fn de() -> StoreContext {
    StoreContext::new(2, "de")
}

/// A migrated database with one worker's collaborators wired up.
pub struct Harness {
    pub db: TestDb,
    pub conn: SqliteConnection,
    pub locks: LockManager,
    pub resolver: VariantResolver,
    pub sink: ChannelSink,
    pub events: Receiver<CatalogEvent>,
}

pub fn harness() -> Harness {
    let (db, conn) = setup_db();
    let locks = LockManager::open(&db.path, fast_policy()).expect("lock manager");
    let (sink, events) = ChannelSink::channel();
    Harness {
        db,
        conn,
        locks,
        resolver: VariantResolver::default(),
        sink,
        events,
    }
}

impl Harness {
    pub fn sync_with(
        &mut self,
        records: Vec<RawProduct>,
        ctx: &StoreContext,
        options: ProductSyncOptions,
    ) -> SyncResult {
        let Harness {
            conn,
            locks,
            resolver,
            sink,
            ..
        } = self;
        ProductSynchronizer::new(&*locks, &*resolver, &*sink, options).synchronize(conn, records, ctx)
    }

    pub fn sync(&mut self, records: Vec<RawProduct>) -> SyncResult {
        self.sync_with(records, &en(), ProductSyncOptions::default())
    }

    pub fn drain_events(&self) -> Vec<CatalogEvent> {
        self.events.try_iter().collect()
    }
}

// ----------------------- feed builders ------------------

pub fn attr(code: &str, value: &str) -> RawAttribute {
    RawAttribute {
        attribute_code: code.into(),
        value: json!(value),
    }
}

pub fn simple(sku: &str) -> RawProduct {
    RawProduct {
        sku: sku.into(),
        type_id: "simple".into(),
        name: format!("{sku} name"),
        price: Some(10.0),
        attribute_set: Some("clothing".into()),
        ..Default::default()
    }
}

pub fn variant(sku: &str, attrs: &[(&str, &str)]) -> RawProduct {
    RawProduct {
        sku: sku.into(),
        type_id: "variant".into(),
        name: format!("{sku} name"),
        price: Some(12.0),
        visibility: VISIBILITY_NOT_VISIBLE,
        attribute_set: Some("clothing".into()),
        custom_attributes: attrs.iter().map(|(k, v)| attr(k, v)).collect(),
        ..Default::default()
    }
}

pub fn configurable(sku: &str, options: &[(&str, &[&str])], children: &[&str]) -> RawProduct {
    RawProduct {
        sku: sku.into(),
        type_id: "configurable".into(),
        name: format!("{sku} name"),
        price: Some(12.0),
        attribute_set: Some("clothing".into()),
        extension_attributes: RawExtension {
            configurable_product_options: Some(
                options
                    .iter()
                    .enumerate()
                    .map(|(i, (code, values))| RawConfigurableOption {
                        attribute_code: code.to_string(),
                        position: i as i32,
                        values: values
                            .iter()
                            .map(|v| RawOptionValue {
                                value_index: v.to_string(),
                            })
                            .collect(),
                    })
                    .collect(),
            ),
            configurable_product_links: Some(children.iter().map(|c| c.to_string()).collect()),
        },
        ..Default::default()
    }
}

pub fn grouped(sku: &str, members: &[&str]) -> RawProduct {
    RawProduct {
        sku: sku.into(),
        type_id: "grouped".into(),
        name: format!("{sku} name"),
        product_links: members
            .iter()
            .enumerate()
            .map(|(i, m)| RawProductLink {
                link_type: "associated".into(),
                linked_product_sku: m.to_string(),
                position: i as i32,
            })
            .collect(),
        ..Default::default()
    }
}

/// `TEE` with color {red, blue} x size {S, M}, parent listed first.
pub fn tee_family() -> Vec<RawProduct> {
    vec![
        configurable(
            "TEE",
            &[("color", &["red", "blue"]), ("size", &["S", "M"])],
            &["TEE-RED-S", "TEE-RED-M", "TEE-BLUE-S", "TEE-BLUE-M"],
        ),
        variant("TEE-RED-S", &[("color", "red"), ("size", "S")]),
        variant("TEE-RED-M", &[("color", "red"), ("size", "M")]),
        variant("TEE-BLUE-S", &[("color", "blue"), ("size", "S")]),
        variant("TEE-BLUE-M", &[("color", "blue"), ("size", "M")]),
    ]
}
