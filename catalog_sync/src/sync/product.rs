//! Product batch synchronization.

use std::collections::BTreeMap;

use diesel::SqliteConnection;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Outcome, SyncResult};
use crate::config::SyncConfig;
use crate::error::{CatalogError, Result};
use crate::events::{CatalogEvent, EventSink, SyncScope};
use crate::feed::{
    CatalogSource, RawProduct, STATUS_ENABLED, StoreContext, VISIBILITY_NOT_VISIBLE,
    fetch_all_products, normalize_code, value_to_text,
};
use crate::lock::{LockKey, LockManager};
use crate::models::{
    CatalogItem, CatalogItemChanges, ConfigurableAttribute, DisplayRecordChanges, ProductLinks,
};
use crate::product_type::ProductType;
use crate::store::{WriteOutcome, display, items, stock};
use crate::tz;
use crate::variant::VariantResolver;

/// Behavior switches for [`ProductSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSyncOptions {
    /// Delete the translation of disabled products instead of storing them disabled.
    pub delete_on_disable: bool,
    /// Extra passes over composites still missing children after the main pass.
    pub deferred_passes: u32,
    /// Records per page when draining a [`CatalogSource`].
    pub page_size: u32,
}

impl Default for ProductSyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for ProductSyncOptions {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            delete_on_disable: cfg.delete_on_disable,
            deferred_passes: cfg.deferred_passes,
            page_size: cfg.page_size,
        }
    }
}

/// A record that passed validation.
struct Staged {
    sku: String,
    product_type: ProductType,
    raw: RawProduct,
}

/// Mirrors feed products into the catalog store.
pub struct ProductSynchronizer<'a> {
    locks: &'a LockManager,
    resolver: &'a VariantResolver,
    events: &'a dyn EventSink,
    options: ProductSyncOptions,
}

impl<'a> ProductSynchronizer<'a> {
    /// Synchronizer writing through `locks`, keeping `resolver`'s cache fresh and
    /// reporting to `events`.
    pub fn new(
        locks: &'a LockManager,
        resolver: &'a VariantResolver,
        events: &'a dyn EventSink,
        options: ProductSyncOptions,
    ) -> Self {
        Self {
            locks,
            resolver,
            events,
            options,
        }
    }

    /// Drain `source` page by page and synchronize every product.
    pub fn synchronize_from(
        &self,
        conn: &mut SqliteConnection,
        source: &dyn CatalogSource,
        ctx: &StoreContext,
    ) -> anyhow::Result<SyncResult> {
        let records = fetch_all_products(source, self.options.page_size)?;
        Ok(self.synchronize(conn, records, ctx))
    }

    /// Synchronize one batch of feed records into the `ctx` translation.
    ///
    /// Non-composite records are written first, composites after. Composites still
    /// missing children are retried for the configured number of deferred passes and
    /// then reported as failed.
    pub fn synchronize(
        &self,
        conn: &mut SqliteConnection,
        records: Vec<RawProduct>,
        ctx: &StoreContext,
    ) -> SyncResult {
        let mut result = SyncResult::default();

        let mut simple = Vec::new();
        let mut composite = Vec::new();
        for (position, raw) in records.into_iter().enumerate() {
            match stage(raw, position) {
                Ok(s) if s.product_type.is_composite() => composite.push(s),
                Ok(s) => simple.push(s),
                Err(CatalogError::Unsupported { sku, product_type }) => {
                    debug!(%sku, %product_type, "ignoring unsupported product type");
                    result.record(
                        sku,
                        Outcome::Ignored,
                        format!("unsupported product type '{product_type}'"),
                    );
                }
                Err(CatalogError::Validation { key, reason }) => {
                    warn!(%key, %reason, "rejecting malformed product");
                    result.record(key, Outcome::Failed, reason);
                }
                Err(e) => {
                    result.record(format!("#{position}"), Outcome::Failed, e.to_string());
                }
            }
        }

        let mut deferred = Vec::new();
        for staged in simple.into_iter().chain(composite) {
            self.process(conn, staged, ctx, &mut result, &mut deferred);
        }

        for pass in 1..=self.options.deferred_passes {
            if deferred.is_empty() {
                break;
            }
            debug!(pass, pending = deferred.len(), "reprocessing deferred composites");
            for (staged, _) in std::mem::take(&mut deferred) {
                self.process(conn, staged, ctx, &mut result, &mut deferred);
            }
        }
        for (staged, err) in deferred {
            warn!(sku = %staged.sku, error = %err, "composite still missing children");
            result.record(staged.sku, Outcome::Failed, err.to_string());
        }

        let counts = result.counts();
        info!(
            language = %ctx.language,
            created = counts.created,
            updated = counts.updated,
            unchanged = counts.unchanged,
            ignored = counts.ignored,
            failed = counts.failed,
            deleted = counts.deleted,
            "product sync finished"
        );
        self.events.emit(CatalogEvent::SyncCompleted {
            scope: SyncScope::Products,
            counts,
            affected: result.affected(),
        });
        result
    }

    fn process(
        &self,
        conn: &mut SqliteConnection,
        staged: Staged,
        ctx: &StoreContext,
        result: &mut SyncResult,
        deferred: &mut Vec<(Staged, CatalogError)>,
    ) {
        match self.apply(conn, &staged, ctx) {
            Ok((outcome, reason)) => {
                debug!(sku = %staged.sku, ?outcome, "product written");
                result.record(staged.sku, outcome, reason);
            }
            Err(err @ CatalogError::MissingChildren { .. }) => {
                debug!(sku = %staged.sku, error = %err, "deferring composite");
                deferred.push((staged, err));
            }
            Err(err) => {
                warn!(sku = %staged.sku, error = %err, "product sync failed");
                result.record(staged.sku, Outcome::Failed, err.to_string());
            }
        }
    }

    /// Write one record under its SKU lock.
    fn apply(
        &self,
        conn: &mut SqliteConnection,
        staged: &Staged,
        ctx: &StoreContext,
    ) -> Result<(Outcome, String)> {
        let guard = self.locks.acquire(&LockKey::sku(&staged.sku))?;

        let disabled = staged.raw.status != STATUS_ENABLED;
        let written = if disabled && self.options.delete_on_disable {
            delete_translation(conn, &staged.sku, &ctx.language)
        } else {
            self.upsert(conn, staged, ctx)
        };
        drop(guard);

        let (outcome, reason) = written?;
        if outcome != Outcome::Unchanged {
            self.resolver.invalidate_for_write(&staged.sku);
        }
        if staged.product_type == ProductType::Configurable && outcome != Outcome::Deleted {
            self.refresh_index(conn, &staged.sku, &ctx.language);
        }
        Ok((outcome, reason))
    }

    fn upsert(
        &self,
        conn: &mut SqliteConnection,
        staged: &Staged,
        ctx: &StoreContext,
    ) -> Result<(Outcome, String)> {
        let children = staged.product_type.import_children(&staged.raw);
        if staged.product_type.is_composite() {
            let missing = items::missing_skus(conn, &children, &ctx.language)?;
            if !missing.is_empty() {
                return Err(CatalogError::MissingChildren {
                    sku: staged.sku.clone(),
                    missing,
                });
            }
        }

        let item = map_item(staged, children, ctx);
        let changes = CatalogItemChanges::from_item(&item)?;
        let display_changes = staged
            .product_type
            .has_display_record()
            .then(|| map_display(&item, &staged.raw));

        conn.immediate_transaction(|conn| {
            let new_sku = !items::has_any_translation(conn, &staged.sku)?;
            let outcome = items::upsert_item(conn, &changes)?;
            if let Some(d) = &display_changes {
                display::upsert_display(conn, d)?;
            }
            let reason = match outcome {
                WriteOutcome::Created if new_sku => "created".to_string(),
                WriteOutcome::Created => format!("translation '{}' added", ctx.language),
                WriteOutcome::Updated => "updated".to_string(),
                WriteOutcome::Unchanged => "unchanged".to_string(),
            };
            Ok((Outcome::from(outcome), reason))
        })
    }

    fn refresh_index(&self, conn: &mut SqliteConnection, sku: &str, language: &str) {
        let rebuilt = match items::get_translation(conn, sku, language) {
            Ok(Some(parent)) => self.resolver.rebuild(conn, &parent).map(|_| ()),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = rebuilt {
            warn!(sku, language, error = %e, "failed to rebuild variant index");
        }
    }
}

/// Delete one translation with its display record; the stock record goes with the
/// last translation.
fn delete_translation(
    conn: &mut SqliteConnection,
    sku: &str,
    language: &str,
) -> Result<(Outcome, String)> {
    conn.immediate_transaction(|conn| {
        let removed = items::delete_translation(conn, sku, language)?;
        display::delete_display(conn, sku, language)?;
        if removed == 0 {
            return Ok((Outcome::Ignored, "disabled and not stored".to_string()));
        }
        if !items::has_any_translation(conn, sku)? {
            stock::delete_stock(conn, sku)?;
        }
        Ok((Outcome::Deleted, "disabled in backend".to_string()))
    })
}

/// Validate the record shape and classify its type.
fn stage(raw: RawProduct, position: usize) -> Result<Staged> {
    let sku = raw.sku.trim().to_string();
    if sku.is_empty() {
        return Err(CatalogError::validation(format!("#{position}"), "missing sku"));
    }
    let product_type = raw
        .type_id
        .parse::<ProductType>()
        .map_err(|_| CatalogError::Unsupported {
            sku: sku.clone(),
            product_type: raw.type_id.clone(),
        })?;
    product_type.validate(&raw)?;
    Ok(Staged {
        sku,
        product_type,
        raw,
    })
}

fn map_item(staged: &Staged, children: Vec<String>, ctx: &StoreContext) -> CatalogItem {
    let raw = &staged.raw;
    let attributes: BTreeMap<String, String> = raw
        .custom_attributes
        .iter()
        .filter_map(|a| value_to_text(&a.value).map(|v| (normalize_code(&a.attribute_code), v)))
        .collect();
    let special_price = attributes
        .get("special_price")
        .and_then(|s| s.trim().parse::<f64>().ok());
    let configurable_options = raw
        .extension_attributes
        .configurable_product_options
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|o| ConfigurableAttribute {
            code: normalize_code(&o.attribute_code),
            position: o.position,
            values: o.values.iter().map(|v| v.value_index.clone()).collect(),
        })
        .collect();

    CatalogItem {
        id: 0,
        sku: staged.sku.clone(),
        language: ctx.language.clone(),
        store_id: ctx.store_id,
        product_type: staged.product_type,
        name: raw.name.clone(),
        enabled: raw.status == STATUS_ENABLED,
        visible: raw.visibility != VISIBILITY_NOT_VISIBLE,
        price: raw.price,
        special_price,
        attribute_set: raw.attribute_set.clone().unwrap_or_default(),
        attributes,
        links: links(raw),
        children,
        configurable_options,
        updated_at: tz::now_rfc3339_millis(),
    }
}

fn links(raw: &RawProduct) -> ProductLinks {
    let pick = |link_type: &str| -> Vec<String> {
        let mut found: Vec<_> = raw
            .product_links
            .iter()
            .filter(|l| l.link_type == link_type)
            .collect();
        found.sort_by_key(|l| l.position);
        found
            .into_iter()
            .map(|l| l.linked_product_sku.clone())
            .collect()
    };
    ProductLinks {
        crosssell: pick("crosssell"),
        upsell: pick("upsell"),
        related: pick("related"),
    }
}

fn category_ids(raw: &RawProduct) -> Vec<i64> {
    match raw.attribute("category_ids") {
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
            .collect(),
        Some(v) => value_to_text(v)
            .map(|s| s.split(',').filter_map(|p| p.trim().parse().ok()).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn map_display(item: &CatalogItem, raw: &RawProduct) -> DisplayRecordChanges {
    DisplayRecordChanges {
        sku: item.sku.clone(),
        language: item.language.clone(),
        title: item.name.clone(),
        description: item.attribute("description").map(str::to_string),
        category_ids: serde_json::to_string(&category_ids(raw)).unwrap_or_else(|_| "[]".into()),
        published: item.is_published(),
        updated_at: item.updated_at.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{RawAttribute, RawProductLink};
    use serde_json::json;

    fn raw(sku: &str, type_id: &str) -> RawProduct {
        RawProduct {
            sku: sku.into(),
            type_id: type_id.into(),
            name: format!("{sku} name"),
            ..Default::default()
        }
    }

    #[test]
    fn staging_classifies_records() {
        assert!(matches!(
            stage(raw("  ", "simple"), 3),
            Err(CatalogError::Validation { key, .. }) if key == "#3"
        ));
        assert!(matches!(
            stage(raw("B", "bundle"), 0),
            Err(CatalogError::Unsupported { product_type, .. }) if product_type == "bundle"
        ));
        assert!(matches!(
            stage(raw("C", "configurable"), 0),
            Err(CatalogError::Validation { .. })
        ));
        assert_eq!(stage(raw(" A ", "simple"), 0).unwrap().sku, "A");
    }

    #[test]
    fn maps_attributes_links_and_categories() {
        let mut r = raw("A", "simple");
        r.visibility = VISIBILITY_NOT_VISIBLE;
        r.custom_attributes = vec![
            RawAttribute {
                attribute_code: "special_price".into(),
                value: json!("7.5"),
            },
            RawAttribute {
                attribute_code: "category_ids".into(),
                value: json!(["3", 4]),
            },
            RawAttribute {
                attribute_code: " Description".into(),
                value: json!("Soft cotton"),
            },
        ];
        r.product_links = vec![
            RawProductLink {
                link_type: "related".into(),
                linked_product_sku: "Z".into(),
                position: 2,
            },
            RawProductLink {
                link_type: "related".into(),
                linked_product_sku: "Y".into(),
                position: 1,
            },
        ];
        let staged = stage(r, 0).unwrap();
        let item = map_item(&staged, vec![], &StoreContext::new(2, "de"));
        assert_eq!(item.special_price, Some(7.5));
        assert!(item.attributes.contains_key("description"));
        assert_eq!(item.links.related, vec!["Y", "Z"]);
        assert_eq!(item.store_id, 2);
        assert!(!item.is_published());

        let d = map_display(&item, &staged.raw);
        assert_eq!(d.category_ids, "[3,4]");
        assert_eq!(d.description.as_deref(), Some("Soft cotton"));
        assert!(!d.published);
    }
}
