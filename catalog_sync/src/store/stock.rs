//! Stock record queries.

use diesel::prelude::*;

use crate::error::Result;
use crate::models::StockRecord;
use crate::schema::stock_record::dsl as sr;

/// Current stock of `sku`.
pub fn find_stock(conn: &mut SqliteConnection, sku: &str) -> Result<Option<StockRecord>> {
    let rec = sr::stock_record
        .find(sku)
        .select(StockRecord::as_select())
        .first(conn)
        .optional()?;
    Ok(rec)
}

/// Write the stock of one SKU.
pub fn upsert_stock(conn: &mut SqliteConnection, record: &StockRecord) -> Result<()> {
    diesel::insert_into(sr::stock_record)
        .values(record)
        .on_conflict(sr::sku)
        .do_update()
        .set((
            sr::quantity.eq(record.quantity),
            sr::in_stock.eq(record.in_stock),
            sr::updated_at.eq(&record.updated_at),
        ))
        .execute(conn)?;
    Ok(())
}

/// Remove the stock record of `sku`.
pub fn delete_stock(conn: &mut SqliteConnection, sku: &str) -> Result<usize> {
    let n = diesel::delete(sr::stock_record.find(sku)).execute(conn)?;
    Ok(n)
}
