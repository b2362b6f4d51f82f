mod common;
use common::{assert_sqlite_pragmas, count, setup_db};

use catalog_sync::db::migrate;
use diesel::prelude::*;

#[test]
fn migrations_create_schema_with_pragmas() {
    let (db, mut conn) = setup_db();
    assert_sqlite_pragmas(&mut conn);

    for table in [
        "catalog_item",
        "display_record",
        "category_node",
        "category_edge",
        "attribute_option",
        "stock_record",
        "sync_lock",
    ] {
        assert_eq!(count(&mut conn, table), 0, "{table}");
    }

    // Re-running is a no-op.
    migrate::run_all(&db.path).unwrap();
}

#[test]
fn product_type_is_constrained() {
    let (_db, mut conn) = setup_db();
    let err = diesel::sql_query(
        "INSERT INTO catalog_item (sku, language, store_id, product_type, name, enabled, visible, attribute_set, updated_at)
         VALUES ('A', 'en', 1, 'bundle', 'A', 1, 1, '', '2025-01-01T00:00:00.000Z')",
    )
    .execute(&mut conn);
    assert!(err.is_err());
}

#[test]
fn display_records_are_unique_per_language() {
    let (_db, mut conn) = setup_db();
    let insert = "INSERT INTO display_record (sku, language, title, published, updated_at)
                  VALUES ('A', 'en', 'A', 1, '2025-01-01T00:00:00.000Z')";
    diesel::sql_query(insert).execute(&mut conn).unwrap();
    assert!(diesel::sql_query(insert).execute(&mut conn).is_err());
}
