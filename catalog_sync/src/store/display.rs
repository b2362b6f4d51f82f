//! Display record queries.

use diesel::prelude::*;

use crate::error::Result;
use crate::models::{DisplayRecord, DisplayRecordChanges};
use crate::schema::display_record::dsl as dr;

/// Insert or replace the display record of one (sku, language).
pub fn upsert_display(conn: &mut SqliteConnection, changes: &DisplayRecordChanges) -> Result<()> {
    diesel::insert_into(dr::display_record)
        .values(changes)
        .on_conflict((dr::sku, dr::language))
        .do_update()
        .set(changes)
        .execute(conn)?;
    Ok(())
}

/// The display record of one (sku, language).
pub fn get_display(
    conn: &mut SqliteConnection,
    sku: &str,
    language: &str,
) -> Result<Option<DisplayRecord>> {
    let rec = dr::display_record
        .filter(dr::sku.eq(sku).and(dr::language.eq(language)))
        .select(DisplayRecord::as_select())
        .first(conn)
        .optional()?;
    Ok(rec)
}

/// Delete the display record of one (sku, language).
pub fn delete_display(conn: &mut SqliteConnection, sku: &str, language: &str) -> Result<usize> {
    let n = diesel::delete(dr::display_record.filter(dr::sku.eq(sku).and(dr::language.eq(language))))
        .execute(conn)?;
    Ok(n)
}
