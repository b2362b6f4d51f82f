//! Stock ledger: per-SKU quantity and status with change detection.
//!
//! Writes go through [`StockLedger::set_stock`] under the SKU's named lock (the same
//! key the product synchronizer uses), so a stock push never interleaves with a
//! product write for the same SKU. A write that changes nothing emits nothing.

use diesel::SqliteConnection;
use tracing::debug;

use crate::config::StockConfig;
use crate::error::{CatalogError, Result};
use crate::events::{CatalogEvent, EventSink};
use crate::feed::{CatalogSource, RawStock};
use crate::lock::{LockKey, LockManager};
use crate::models::StockRecord;
use crate::store::{items, stock};
use crate::tz;

/// Reconciles stock records and reports meaningful transitions.
pub struct StockLedger<'a> {
    locks: &'a LockManager,
    events: &'a dyn EventSink,
    low_stock_threshold: i64,
}

impl<'a> StockLedger<'a> {
    /// Ledger writing through `locks` and reporting to `events`.
    pub fn new(locks: &'a LockManager, events: &'a dyn EventSink, cfg: &StockConfig) -> Self {
        Self {
            locks,
            events,
            low_stock_threshold: cfg.low_stock_threshold,
        }
    }

    /// Record the stock of `sku`. Returns whether anything changed.
    ///
    /// Errors with [`CatalogError::NotFound`] when the SKU has no stored translation.
    pub fn set_stock(
        &self,
        conn: &mut SqliteConnection,
        sku: &str,
        quantity: i64,
        in_stock: bool,
    ) -> Result<bool> {
        let guard = self.locks.acquire(&LockKey::sku(sku))?;
        let written = conn.immediate_transaction(|conn| {
            if !items::has_any_translation(conn, sku)? {
                return Err(CatalogError::not_found(format!("stock target SKU {sku:?}")));
            }
            let previous = stock::find_stock(conn, sku)?;
            if previous
                .as_ref()
                .is_some_and(|p| p.quantity == quantity && p.in_stock == in_stock)
            {
                return Ok(None);
            }
            stock::upsert_stock(
                conn,
                &StockRecord {
                    sku: sku.to_string(),
                    quantity,
                    in_stock,
                    updated_at: tz::now_rfc3339_millis(),
                },
            )?;
            Ok(Some(previous))
        });
        drop(guard);

        let Some(previous) = written? else {
            debug!(sku, quantity, in_stock, "stock unchanged");
            return Ok(false);
        };

        let status_changed = match &previous {
            None => in_stock,
            Some(p) => p.in_stock != in_stock || (in_stock && (p.quantity > 0) != (quantity > 0)),
        };
        let low_stock = in_stock && quantity < self.low_stock_threshold;
        debug!(sku, quantity, in_stock, status_changed, low_stock, "stock changed");
        self.events.emit(CatalogEvent::StockChanged {
            sku: sku.to_string(),
            status_changed,
            low_stock,
        });
        Ok(true)
    }

    /// Apply a feed stock push. Fractional quantities are truncated.
    pub fn apply(&self, conn: &mut SqliteConnection, raw: &RawStock) -> Result<bool> {
        self.set_stock(conn, raw.sku.trim(), raw.quantity.trunc() as i64, raw.is_in_stock)
    }

    /// Pull the stock of `sku` from `source` and apply it.
    pub fn refresh_from(
        &self,
        conn: &mut SqliteConnection,
        source: &dyn CatalogSource,
        sku: &str,
    ) -> anyhow::Result<bool> {
        let raw = source.fetch_stock(sku)?;
        Ok(self.apply(conn, &raw)?)
    }

    /// Whether `sku` can be ordered.
    ///
    /// Simple items and variants need their own flag and a positive quantity.
    /// Composites are in stock as soon as one child has a positive quantity, whatever
    /// the parent's own record says. Unknown SKUs are out of stock.
    pub fn is_in_stock(&self, conn: &mut SqliteConnection, sku: &str) -> Result<bool> {
        let Some(item) = items::get_any_translation(conn, sku)? else {
            return Ok(false);
        };
        if !item.product_type.is_composite() {
            return Ok(stock::find_stock(conn, sku)?.is_some_and(|s| s.is_orderable()));
        }
        for child in &item.children {
            if stock::find_stock(conn, child)?.is_some_and(|s| s.quantity > 0) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
