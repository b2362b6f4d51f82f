//! Stock model.

use diesel::prelude::*;

use crate::schema::stock_record;

/// A row in [`crate::schema::stock_record`]. One per SKU, shared by all translations.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = stock_record, check_for_backend(diesel::sqlite::Sqlite))]
pub struct StockRecord {
    pub sku: String,
    pub quantity: i64,
    pub in_stock: bool,
    pub updated_at: String,
}

impl StockRecord {
    /// Orderable right now: flagged in stock with something on hand.
    pub fn is_orderable(&self) -> bool {
        self.in_stock && self.quantity > 0
    }
}
