//! Attribute ordering for variant indexes.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::config::{DEFAULT_ATTRIBUTE_SET, UnknownAttributePlacement, VariantConfig};
use crate::models::ConfigurableAttribute;

/// Orders a configurable product's declared attribute codes and decides how option
/// labels are sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantOrdering {
    unknown: UnknownAttributePlacement,
    sortable: HashSet<String>,
    weights: IndexMap<String, IndexMap<String, i32>>,
}

impl Default for VariantOrdering {
    fn default() -> Self {
        Self::from_config(&VariantConfig::default())
    }
}

impl VariantOrdering {
    /// Build from a normalized `[variants]` section.
    pub fn from_config(cfg: &VariantConfig) -> Self {
        Self {
            unknown: cfg.unknown_attributes,
            sortable: cfg.sortable.iter().cloned().collect(),
            weights: cfg.attribute_weights.clone(),
        }
    }

    /// Weight table for an attribute set, falling back to the `default` table.
    fn table(&self, attribute_set: &str) -> Option<&IndexMap<String, i32>> {
        self.weights
            .get(&attribute_set.trim().to_lowercase())
            .or_else(|| self.weights.get(DEFAULT_ATTRIBUTE_SET))
    }

    /// Declared codes in resolution order.
    ///
    /// Natural order is option position, then declaration order. A weight table, when
    /// one applies, reorders configured codes by weight; codes missing from it go before
    /// or after all of them, per the unknown-attribute placement. Both sorts are stable,
    /// so ties keep natural order.
    pub fn order_codes(&self, attribute_set: &str, declared: &[ConfigurableAttribute]) -> Vec<String> {
        let mut natural: Vec<&ConfigurableAttribute> = declared.iter().collect();
        natural.sort_by_key(|a| a.position);

        let mut codes: Vec<String> = Vec::with_capacity(natural.len());
        for a in natural {
            if !codes.contains(&a.code) {
                codes.push(a.code.clone());
            }
        }

        if let Some(table) = self.table(attribute_set) {
            codes.sort_by_key(|code| match table.get(&code.to_lowercase()) {
                Some(&weight) => (1, weight),
                None if self.unknown == UnknownAttributePlacement::First => (0, 0),
                None => (2, 0),
            });
        }
        codes
    }

    /// Whether option labels of `code` sort by dictionary weight.
    pub fn is_sortable(&self, code: &str) -> bool {
        self.sortable.contains(&code.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(code: &str, position: i32) -> ConfigurableAttribute {
        ConfigurableAttribute {
            code: code.into(),
            position,
            values: vec![],
        }
    }

    fn ordering(placement: UnknownAttributePlacement) -> VariantOrdering {
        let mut cfg = VariantConfig {
            unknown_attributes: placement,
            ..Default::default()
        };
        cfg.attribute_weights.insert(
            "clothing".into(),
            IndexMap::from([("size".to_string(), 10), ("color".to_string(), 20)]),
        );
        VariantOrdering::from_config(&cfg)
    }

    #[test]
    fn natural_order_without_table() {
        let o = VariantOrdering::default();
        let declared = [attr("size", 2), attr("color", 1), attr("fit", 1)];
        assert_eq!(o.order_codes("clothing", &declared), vec!["color", "fit", "size"]);
    }

    #[test]
    fn weights_reorder_and_unknowns_follow_placement() {
        let declared = [attr("material", 0), attr("color", 1), attr("fit", 2), attr("size", 3)];

        let last = ordering(UnknownAttributePlacement::Last);
        assert_eq!(
            last.order_codes("Clothing", &declared),
            vec!["size", "color", "material", "fit"]
        );

        let first = ordering(UnknownAttributePlacement::First);
        assert_eq!(
            first.order_codes("clothing", &declared),
            vec!["material", "fit", "size", "color"]
        );
    }

    #[test]
    fn unknowns_never_interleave_with_large_weights() {
        let mut cfg = VariantConfig::default();
        cfg.attribute_weights.insert(
            "clothing".into(),
            IndexMap::from([("size".to_string(), 10), ("color".to_string(), 100)]),
        );
        let declared = [attr("material", 0), attr("color", 1), attr("size", 2)];
        assert_eq!(
            VariantOrdering::from_config(&cfg).order_codes("clothing", &declared),
            vec!["size", "color", "material"]
        );

        cfg.unknown_attributes = UnknownAttributePlacement::First;
        cfg.attribute_weights["clothing"].insert("size".into(), -100);
        assert_eq!(
            VariantOrdering::from_config(&cfg).order_codes("clothing", &declared),
            vec!["material", "size", "color"]
        );
    }

    #[test]
    fn unmatched_set_uses_default_table() {
        let mut cfg = VariantConfig::default();
        cfg.attribute_weights.insert(
            DEFAULT_ATTRIBUTE_SET.into(),
            IndexMap::from([("color".to_string(), 1), ("size".to_string(), 0)]),
        );
        let o = VariantOrdering::from_config(&cfg);
        assert_eq!(
            o.order_codes("shoes", &[attr("color", 0), attr("size", 1)]),
            vec!["size", "color"]
        );
    }
}
