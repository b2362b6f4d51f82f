//! Lock-free, read-mostly cache of variant indexes keyed by (parent SKU, language).
//!
//! Readers load an `Arc` snapshot of the whole map with no lock contention. Writers
//! swap in a modified copy with `rcu`, so concurrent readers see either the old or the
//! new map. The cache is an ordinary value: share it with `Arc<VariantCache>`.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::index::VariantIndex;

type CacheMap = HashMap<(String, String), Arc<VariantIndex>>;

/// Variant indexes shared between the synchronizers and readers.
#[derive(Debug)]
pub struct VariantCache {
    map: ArcSwap<CacheMap>,
}

impl Default for VariantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self {
            map: ArcSwap::from_pointee(CacheMap::new()),
        }
    }

    /// Cached index of (`parent_sku`, `language`).
    pub fn get(&self, parent_sku: &str, language: &str) -> Option<Arc<VariantIndex>> {
        self.map
            .load()
            .get(&(parent_sku.to_string(), language.to_string()))
            .cloned()
    }

    /// Store an index, replacing any previous one for the same key.
    pub fn insert(&self, index: VariantIndex) -> Arc<VariantIndex> {
        let index = Arc::new(index);
        let key = (index.parent_sku().to_string(), index.language().to_string());
        self.map.rcu(|current| {
            let mut next = CacheMap::clone(current);
            next.insert(key.clone(), Arc::clone(&index));
            next
        });
        index
    }

    /// Drop one entry. Returns whether it was cached.
    pub fn invalidate(&self, parent_sku: &str, language: &str) -> bool {
        let key = (parent_sku.to_string(), language.to_string());
        if !self.map.load().contains_key(&key) {
            return false;
        }
        self.map.rcu(|current| {
            let mut next = CacheMap::clone(current);
            next.remove(&key);
            next
        });
        true
    }

    /// Drop every entry, in any language, that a write to `sku` affects: the index of
    /// `sku` itself and every index listing it as a child.
    pub fn invalidate_sku(&self, sku: &str) -> usize {
        let stale = self.map.load().values().filter(|i| i.touches(sku)).count();
        if stale == 0 {
            return 0;
        }
        self.map.rcu(|current| {
            current
                .iter()
                .filter(|(_, index)| !index.touches(sku))
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect::<CacheMap>()
        });
        stale
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.map.store(Arc::new(CacheMap::new()));
    }

    /// Number of cached indexes.
    pub fn len(&self) -> usize {
        self.map.load().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.map.load().is_empty()
    }
}
