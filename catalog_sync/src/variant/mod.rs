//! Variant resolution for configurable products.
//!
//! [`VariantResolver`] answers "which child SKU matches this attribute selection" and
//! "which options remain valid" from a [`VariantIndex`] per (parent SKU, language).
//! Indexes are built on first use from the stored translations and kept in an
//! injectable [`VariantCache`]; the product synchronizer rebuilds or invalidates them
//! after each committed write.

mod cache;
mod index;
mod order;

pub use cache::VariantCache;
pub use index::{OptionDictionary, Selection, Step, VariantIndex, VariantNode, VariantOption};
pub use order::VariantOrdering;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::models::CatalogItem;
use crate::product_type::ProductType;
use crate::store::{items, options};

/// Builds, caches and queries variant indexes.
#[derive(Debug, Clone)]
pub struct VariantResolver {
    cache: Arc<VariantCache>,
    ordering: VariantOrdering,
}

impl Default for VariantResolver {
    fn default() -> Self {
        Self::new(Arc::new(VariantCache::new()), VariantOrdering::default())
    }
}

impl VariantResolver {
    /// Resolver over a shared cache.
    pub fn new(cache: Arc<VariantCache>, ordering: VariantOrdering) -> Self {
        Self { cache, ordering }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<VariantCache> {
        &self.cache
    }

    /// Attribute ordering in effect.
    pub fn ordering(&self) -> &VariantOrdering {
        &self.ordering
    }

    /// Cached index of `parent_sku`, building it on a miss.
    ///
    /// `None` when the parent has no translation in `language` or is not configurable.
    pub fn index(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
    ) -> Result<Option<Arc<VariantIndex>>> {
        if let Some(hit) = self.cache.get(parent_sku, language) {
            return Ok(Some(hit));
        }
        match items::get_translation(conn, parent_sku, language)? {
            Some(parent) if parent.product_type == ProductType::Configurable => {
                self.rebuild(conn, &parent).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Build the index of `parent` from the store and cache it.
    pub fn rebuild(
        &self,
        conn: &mut SqliteConnection,
        parent: &CatalogItem,
    ) -> Result<Arc<VariantIndex>> {
        let children = items::load_translations(conn, &parent.children, &parent.language)?;
        let codes: Vec<String> = parent
            .configurable_options
            .iter()
            .map(|a| a.code.clone())
            .collect();
        let dictionary =
            OptionDictionary::from_options(options::load_options(conn, &codes, &parent.language)?);
        let index = VariantIndex::build(parent, &children, &self.ordering, &dictionary);
        Ok(self.cache.insert(index))
    }

    fn require(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
    ) -> Result<Arc<VariantIndex>> {
        self.index(conn, parent_sku, language)?.ok_or_else(|| {
            CatalogError::not_found(format!("configurable product {parent_sku} ({language})"))
        })
    }

    /// Child SKU for a full selection; `Ok(None)` when no child matches.
    pub fn resolve(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
        selection: &Selection,
    ) -> Result<Option<String>> {
        let index = self.require(conn, parent_sku, language)?;
        Ok(index.resolve(selection).map(str::to_string))
    }

    /// Remaining valid options for every attribute not set in `selection`.
    pub fn narrow(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
        selection: &Selection,
    ) -> Result<BTreeMap<String, BTreeSet<String>>> {
        Ok(self.require(conn, parent_sku, language)?.narrow(selection))
    }

    /// Next step of a guided selection.
    pub fn step(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
        selection: &Selection,
    ) -> Result<Step> {
        Ok(self.require(conn, parent_sku, language)?.step(selection))
    }

    /// Labeled options of one attribute in display order.
    pub fn options(
        &self,
        conn: &mut SqliteConnection,
        parent_sku: &str,
        language: &str,
        code: &str,
    ) -> Result<Vec<VariantOption>> {
        Ok(self.require(conn, parent_sku, language)?.options(code).to_vec())
    }

    /// Drop cached indexes a committed write to `sku` made stale.
    pub fn invalidate_for_write(&self, sku: &str) -> usize {
        let dropped = self.cache.invalidate_sku(sku);
        if dropped > 0 {
            debug!(sku, dropped, "variant indexes invalidated");
        }
        dropped
    }
}
