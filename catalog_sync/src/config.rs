//! Engine configuration: parsing, normalization, and loading.
//!
//! A TOML document configures the knobs the synchronizers, the stock ledger and the
//! variant resolver read at construction time:
//!
//! ```toml
//! [sync]
//! delete_on_disable = true
//! deferred_passes = 1
//!
//! [lock]
//! retry_interval_ms = 500
//! max_attempts = 120        # 0 = wait forever
//!
//! [stock]
//! low_stock_threshold = 5
//!
//! [variants]
//! unknown_attributes = "last"
//! sortable = ["size"]
//! [variants.attribute_weights.clothing]
//! color = 10
//! size = 20
//!
//! [categories]
//! implicit_root_levels = 1
//! ```
//!
//! Every section and field is optional. Normalization lowercases and trims attribute
//! codes and attribute set names, de-duplicates `sortable` preserving order, and
//! rejects inconsistent values.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]
//! - In-place normalization with a report: [`normalize_config`]

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::lock::LockPolicy;

/// Name of the weight table used when a product's attribute set has none.
pub const DEFAULT_ATTRIBUTE_SET: &str = "default";

/// Environment variable holding the catalog database URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Product synchronization.
    pub sync: SyncConfig,
    /// Named lock acquisition.
    pub lock: LockConfig,
    /// Stock ledger.
    pub stock: StockConfig,
    /// Variant resolution.
    pub variants: VariantConfig,
    /// Category tree synchronization.
    pub categories: CategoryConfig,
}

/// `[sync]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Delete the translation (and its display record) of disabled products.
    pub delete_on_disable: bool,
    /// Extra passes over composites still missing children after the main pass.
    pub deferred_passes: u32,
    /// Page size used when draining a paginated product listing.
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            delete_on_disable: false,
            deferred_passes: 1,
            page_size: 100,
        }
    }
}

/// `[lock]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Sleep between acquisition attempts, in milliseconds.
    pub retry_interval_ms: u64,
    /// Attempts before giving up; `0` waits forever.
    pub max_attempts: u32,
    /// Lease of a held lock, in milliseconds. A lock left behind by a crashed worker
    /// can be taken over once its lease ran out.
    pub lease_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 500,
            max_attempts: 120,
            lease_ms: 300_000,
        }
    }
}

impl LockConfig {
    /// Acquisition policy for a [`crate::lock::LockManager`].
    pub fn policy(&self) -> LockPolicy {
        LockPolicy {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            lease: Duration::from_millis(self.lease_ms),
        }
    }
}

/// `[stock]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StockConfig {
    /// In-stock quantities strictly below this are reported as low stock.
    pub low_stock_threshold: i64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
        }
    }
}

/// Where attribute codes missing from a weight table go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAttributePlacement {
    /// Before every configured code.
    First,
    /// After every configured code.
    #[default]
    Last,
}

/// `[variants]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantConfig {
    /// Placement of codes without a configured weight, whatever the weights are.
    pub unknown_attributes: UnknownAttributePlacement,
    /// Attribute codes whose option labels sort by dictionary weight instead of
    /// import position.
    pub sortable: Vec<String>,
    /// Attribute set name -> attribute code -> weight. Lower weights come first.
    pub attribute_weights: IndexMap<String, IndexMap<String, i32>>,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            unknown_attributes: UnknownAttributePlacement::Last,
            sortable: Vec::new(),
            attribute_weights: IndexMap::new(),
        }
    }
}

/// `[categories]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryConfig {
    /// Top levels of the remote tree that are walked but not stored.
    pub implicit_root_levels: u32,
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Attribute codes or set names changed by trimming/lowercasing.
    pub keys_renamed: usize,
    /// Duplicate `sortable` entries removed.
    pub sortable_deduped: usize,
    /// Weight tables with no entries removed.
    pub empty_tables_dropped: usize,
}

fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Normalize a configuration in place.
///
/// Errors:
/// - empty attribute code or attribute set name after trimming
/// - two keys colliding after normalization
/// - `retry_interval_ms`, `lease_ms` or `page_size` set to `0`
pub fn normalize_config(cfg: &mut CatalogConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    if cfg.lock.retry_interval_ms == 0 {
        bail!("lock.retry_interval_ms must be > 0");
    }
    if cfg.lock.lease_ms == 0 {
        bail!("lock.lease_ms must be > 0");
    }
    if cfg.sync.page_size == 0 {
        bail!("sync.page_size must be > 0");
    }
    let v = &mut cfg.variants;

    let mut seen = HashSet::new();
    let mut sortable = Vec::with_capacity(v.sortable.len());
    for raw in std::mem::take(&mut v.sortable) {
        let code = norm(&raw);
        if code.is_empty() {
            bail!("variants.sortable entry cannot be empty");
        }
        if code != raw {
            report.keys_renamed += 1;
        }
        if seen.insert(code.clone()) {
            sortable.push(code);
        } else {
            report.sortable_deduped += 1;
        }
    }
    v.sortable = sortable;

    let mut tables = IndexMap::new();
    for (raw_set, table) in std::mem::take(&mut v.attribute_weights) {
        let set = norm(&raw_set);
        if set.is_empty() {
            bail!("attribute set name cannot be empty");
        }
        if set != raw_set {
            report.keys_renamed += 1;
        }
        if tables.contains_key(&set) {
            bail!("duplicate attribute set after normalization: {set}");
        }
        let mut weights = IndexMap::new();
        for (raw_code, weight) in table {
            let code = norm(&raw_code);
            if code.is_empty() {
                bail!("attribute code in weight table '{set}' cannot be empty");
            }
            if code != raw_code {
                report.keys_renamed += 1;
            }
            if weights.insert(code.clone(), weight).is_some() {
                bail!("duplicate attribute code '{code}' in weight table '{set}'");
            }
        }
        if weights.is_empty() {
            report.empty_tables_dropped += 1;
            continue;
        }
        tables.insert(set, weights);
    }
    v.attribute_weights = tables;

    Ok(report)
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<CatalogConfig> {
    let mut cfg: CatalogConfig =
        toml::from_str(toml_str).context("failed to parse catalog config TOML")?;
    let report = normalize_config(&mut cfg).context("normalize_config failed")?;
    tracing::debug!(?report, "catalog config normalized");
    Ok(cfg)
}

/// Read a configuration file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<CatalogConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read catalog config {}", path.as_ref().display()))?;
    load_config_str(&text)
}

/// Read the database URL from `DATABASE_URL`.
pub fn database_url_from_env() -> anyhow::Result<String> {
    std::env::var(DATABASE_URL_ENV)
        .with_context(|| format!("missing environment variable {DATABASE_URL_ENV}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg, CatalogConfig::default());
        assert_eq!(cfg.lock.policy(), LockPolicy::default());
        assert_eq!(cfg.sync.deferred_passes, 1);
        assert_eq!(cfg.stock.low_stock_threshold, 5);
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let cfg = load_config_str("[lock]\nmax_attempts = 0\nretry_interval_ms = 20").unwrap();
        let policy = cfg.lock.policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.retry_interval, Duration::from_millis(20));
    }

    #[test]
    fn normalizes_codes_and_sets() {
        let cfg = load_config_str(
            r#"
            [variants]
            unknown_attributes = "first"
            sortable = ["Size", " size ", "color"]
            [variants.attribute_weights." Clothing "]
            Color = 10
            size = 20
            [variants.attribute_weights.shoes]
            "#,
        )
        .unwrap();

        let v = &cfg.variants;
        assert_eq!(v.unknown_attributes, UnknownAttributePlacement::First);
        assert_eq!(v.sortable, vec!["size", "color"]);
        assert_eq!(v.attribute_weights.len(), 1);
        assert_eq!(v.attribute_weights["clothing"]["color"], 10);
    }

    #[test]
    fn report_counts_changes() {
        let mut cfg = CatalogConfig::default();
        cfg.variants.sortable = vec!["Size".into(), "size".into()];
        cfg.variants
            .attribute_weights
            .insert("empty".into(), IndexMap::new());
        let report = normalize_config(&mut cfg).unwrap();
        assert_eq!(
            report,
            NormalizationReport {
                keys_renamed: 1,
                sortable_deduped: 1,
                empty_tables_dropped: 1,
            }
        );
    }

    #[test]
    fn colliding_codes_error() {
        let err = load_config_str(
            r#"
            [variants.attribute_weights.clothing]
            color = 1
            COLOR = 2
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("duplicate attribute code"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load_config_str("[variants]\nunknown_attributes = \"middle\"").is_err());
        assert!(load_config_str("[lock]\nretry_interval_ms = 0").is_err());
        assert!(load_config_str("[lock]\nlease_ms = 0").is_err());
        assert!(load_config_str("[sync]\nbogus = 1").is_err());
    }
}
