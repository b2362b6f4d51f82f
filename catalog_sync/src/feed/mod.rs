//! Pull interface to the remote catalog backend.
//!
//! Transport, authentication and retries live behind [`CatalogSource`]; the engine only
//! sees raw records. [`FeedSnapshot`] is an in-memory source backed by a JSON document,
//! used for replaying captured feeds and in tests.

mod raw;

pub use raw::{
    RawAttribute, RawAttributeOption, RawCategory, RawConfigurableOption, RawExtension,
    RawOptionValue, RawProduct, RawProductLink, RawStock, STATUS_ENABLED, VISIBILITY_BOTH,
    VISIBILITY_NOT_VISIBLE, normalize_code, value_to_text,
};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// Which store view (and therefore which translation) a sync run writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreContext {
    /// Remote store id.
    pub store_id: i64,
    /// Language code of the store view, e.g. `en` or `de`.
    pub language: String,
}

impl StoreContext {
    /// Build a context for one store view.
    pub fn new(store_id: i64, language: impl Into<String>) -> Self {
        Self {
            store_id,
            language: language.into(),
        }
    }
}

/// One page of a paginated product listing (pages are 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext {
    /// 1-based page number.
    pub page: u32,
    /// Maximum records per page.
    pub page_size: u32,
}

/// Source of raw catalog records.
pub trait CatalogSource {
    /// Fetch one page of products.
    fn fetch_products(&self, page: &PageContext) -> anyhow::Result<Vec<RawProduct>>;

    /// Fetch the full category tree for a store view.
    fn fetch_categories(&self, ctx: &StoreContext) -> anyhow::Result<RawCategory>;

    /// Fetch the stock record of one SKU.
    fn fetch_stock(&self, sku: &str) -> anyhow::Result<RawStock>;

    /// Fetch the option dictionary of one attribute.
    fn fetch_attribute_options(&self, attribute_code: &str)
    -> anyhow::Result<Vec<RawAttributeOption>>;
}

/// Drain every page of the product listing.
///
/// Stops at the first page shorter than `page_size`.
pub fn fetch_all_products(
    source: &dyn CatalogSource,
    page_size: u32,
) -> anyhow::Result<Vec<RawProduct>> {
    if page_size == 0 {
        bail!("page_size must be > 0");
    }
    let mut out = Vec::new();
    let mut page = 1;
    loop {
        let batch = source
            .fetch_products(&PageContext { page, page_size })
            .with_context(|| format!("fetch product page {page}"))?;
        let last = batch.len() < page_size as usize;
        out.extend(batch);
        if last {
            return Ok(out);
        }
        page += 1;
    }
}

/// A captured feed held in memory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedSnapshot {
    /// Product listing, in feed order.
    #[serde(default)]
    pub products: Vec<RawProduct>,
    /// Category tree root.
    #[serde(default)]
    pub categories: Option<RawCategory>,
    /// Stock records.
    #[serde(default)]
    pub stock: Vec<RawStock>,
    /// Attribute option dictionary.
    #[serde(default)]
    pub attribute_options: Vec<RawAttributeOption>,
}

impl FeedSnapshot {
    /// Parse a snapshot from a JSON document.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse feed snapshot JSON")
    }

    /// Read and parse a snapshot file.
    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read feed snapshot {}", path.as_ref().display()))?;
        Self::from_json_str(&text)
    }
}

impl CatalogSource for FeedSnapshot {
    fn fetch_products(&self, page: &PageContext) -> anyhow::Result<Vec<RawProduct>> {
        if page.page == 0 {
            bail!("pages are 1-based");
        }
        let start = (page.page as usize - 1) * page.page_size as usize;
        Ok(self
            .products
            .iter()
            .skip(start)
            .take(page.page_size as usize)
            .cloned()
            .collect())
    }

    fn fetch_categories(&self, _ctx: &StoreContext) -> anyhow::Result<RawCategory> {
        self.categories
            .clone()
            .context("feed snapshot has no category tree")
    }

    fn fetch_stock(&self, sku: &str) -> anyhow::Result<RawStock> {
        self.stock
            .iter()
            .find(|s| s.sku == sku)
            .cloned()
            .with_context(|| format!("no stock record for {sku}"))
    }

    fn fetch_attribute_options(
        &self,
        attribute_code: &str,
    ) -> anyhow::Result<Vec<RawAttributeOption>> {
        Ok(self
            .attribute_options
            .iter()
            .filter(|o| o.attribute_code == attribute_code)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(n: usize) -> FeedSnapshot {
        FeedSnapshot {
            products: (0..n)
                .map(|i| RawProduct {
                    sku: format!("SKU-{i}"),
                    type_id: "simple".into(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn drains_all_pages() {
        let feed = snapshot(7);
        let all = fetch_all_products(&feed, 3).unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all[6].sku, "SKU-6");
    }

    #[test]
    fn exact_multiple_ends_on_empty_page() {
        let feed = snapshot(6);
        assert_eq!(fetch_all_products(&feed, 3).unwrap().len(), 6);
        assert!(fetch_all_products(&feed, 0).is_err());
    }

    #[test]
    fn parses_snapshot_json() {
        let feed = FeedSnapshot::from_json_str(
            r#"{
                "products": [{"sku": "A", "type_id": "simple"}],
                "stock": [{"sku": "A", "qty": 2, "is_in_stock": 1}],
                "categories": {"id": 1, "name": "Root"}
            }"#,
        )
        .unwrap();
        assert_eq!(feed.fetch_stock("A").unwrap().quantity, 2.0);
        assert!(feed.fetch_stock("B").is_err());
        assert_eq!(feed.fetch_categories(&StoreContext::new(1, "en")).unwrap().id, 1);
    }
}
