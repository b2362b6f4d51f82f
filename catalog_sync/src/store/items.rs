//! Catalog item queries.

use std::collections::HashSet;

use diesel::prelude::*;
use tracing::warn;

use super::WriteOutcome;
use crate::error::Result;
use crate::models::{CatalogItem, CatalogItemChanges, CatalogItemRow};
use crate::schema::catalog_item::dsl as ci;

/// All rows for one (sku, language), lowest id first.
pub fn find_rows(
    conn: &mut SqliteConnection,
    sku: &str,
    language: &str,
) -> QueryResult<Vec<CatalogItemRow>> {
    ci::catalog_item
        .filter(ci::sku.eq(sku).and(ci::language.eq(language)))
        .order(ci::id.asc())
        .select(CatalogItemRow::as_select())
        .load(conn)
}

fn first_row(
    conn: &mut SqliteConnection,
    sku: &str,
    language: &str,
) -> Result<Option<CatalogItemRow>> {
    let rows = find_rows(conn, sku, language)?;
    if rows.len() > 1 {
        warn!(
            sku,
            language,
            duplicates = rows.len(),
            "duplicate natural key; using first match"
        );
    }
    Ok(rows.into_iter().next())
}

/// The translation of `sku` in `language`, if present.
pub fn get_translation(
    conn: &mut SqliteConnection,
    sku: &str,
    language: &str,
) -> Result<Option<CatalogItem>> {
    first_row(conn, sku, language)?
        .map(CatalogItem::try_from)
        .transpose()
}

/// Whether `sku` has a translation in `language`.
pub fn has_translation(conn: &mut SqliteConnection, sku: &str, language: &str) -> Result<bool> {
    let found = diesel::select(diesel::dsl::exists(
        ci::catalog_item.filter(ci::sku.eq(sku).and(ci::language.eq(language))),
    ))
    .get_result::<bool>(conn)?;
    Ok(found)
}

/// Whether `sku` has a translation in any language.
pub fn has_any_translation(conn: &mut SqliteConnection, sku: &str) -> Result<bool> {
    let found = diesel::select(diesel::dsl::exists(ci::catalog_item.filter(ci::sku.eq(sku))))
        .get_result::<bool>(conn)?;
    Ok(found)
}

/// One translation per language for `sku`, ordered by language.
pub fn translations(conn: &mut SqliteConnection, sku: &str) -> Result<Vec<CatalogItem>> {
    let rows: Vec<CatalogItemRow> = ci::catalog_item
        .filter(ci::sku.eq(sku))
        .order((ci::language.asc(), ci::id.asc()))
        .select(CatalogItemRow::as_select())
        .load(conn)?;
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| seen.insert(r.language.clone()))
        .map(CatalogItem::try_from)
        .collect()
}

/// The oldest translation of `sku` in any language. Used for language-independent
/// facts such as product type and child list.
pub fn get_any_translation(conn: &mut SqliteConnection, sku: &str) -> Result<Option<CatalogItem>> {
    let row: Option<CatalogItemRow> = ci::catalog_item
        .filter(ci::sku.eq(sku))
        .order(ci::id.asc())
        .select(CatalogItemRow::as_select())
        .first(conn)
        .optional()?;
    row.map(CatalogItem::try_from).transpose()
}

/// Create the (sku, language) translation or update the first matching row.
pub fn upsert_item(
    conn: &mut SqliteConnection,
    changes: &CatalogItemChanges,
) -> Result<WriteOutcome> {
    match first_row(conn, &changes.sku, &changes.language)? {
        None => {
            diesel::insert_into(ci::catalog_item)
                .values(changes)
                .execute(conn)?;
            Ok(WriteOutcome::Created)
        }
        Some(row) if changes.same_content(&row) => Ok(WriteOutcome::Unchanged),
        Some(row) => {
            diesel::update(ci::catalog_item.find(row.id))
                .set(changes)
                .execute(conn)?;
            Ok(WriteOutcome::Updated)
        }
    }
}

/// Delete every row of the (sku, language) translation. Returns the number of rows removed.
pub fn delete_translation(conn: &mut SqliteConnection, sku: &str, language: &str) -> Result<usize> {
    let n = diesel::delete(ci::catalog_item.filter(ci::sku.eq(sku).and(ci::language.eq(language))))
        .execute(conn)?;
    Ok(n)
}

/// The subset of `skus` without a translation in `language`, in input order.
pub fn missing_skus(
    conn: &mut SqliteConnection,
    skus: &[String],
    language: &str,
) -> Result<Vec<String>> {
    if skus.is_empty() {
        return Ok(Vec::new());
    }
    let present: HashSet<String> = ci::catalog_item
        .filter(ci::sku.eq_any(skus).and(ci::language.eq(language)))
        .select(ci::sku)
        .distinct()
        .load::<String>(conn)?
        .into_iter()
        .collect();
    Ok(skus
        .iter()
        .filter(|s| !present.contains(*s))
        .cloned()
        .collect())
}

/// First translation in `language` for each of `skus`, in input order. Absent SKUs are
/// skipped.
pub fn load_translations(
    conn: &mut SqliteConnection,
    skus: &[String],
    language: &str,
) -> Result<Vec<CatalogItem>> {
    if skus.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<CatalogItemRow> = ci::catalog_item
        .filter(ci::sku.eq_any(skus).and(ci::language.eq(language)))
        .order(ci::id.asc())
        .select(CatalogItemRow::as_select())
        .load(conn)?;

    let mut out = Vec::with_capacity(skus.len());
    for sku in skus {
        if let Some(row) = rows.iter().find(|r| &r.sku == sku) {
            out.push(CatalogItem::try_from(row.clone())?);
        }
    }
    Ok(out)
}
