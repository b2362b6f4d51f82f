//! Closed set of mirrored product types and their per-type behavior.
//!
//! Every type-specific decision (which children a record carries, whether it gets a
//! display record, how its price reads, whether it can go into a cart line) is a
//! `match` on [`ProductType`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::feed::RawProduct;
use crate::models::CatalogItem;

/// Link type marking the members of a grouped product.
pub const ASSOCIATED_LINK: &str = "associated";

/// Product type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Standalone purchasable product.
    Simple,
    /// Parent whose purchasable variants differ by a fixed attribute set.
    Configurable,
    /// Parent bundling independently purchasable members.
    Grouped,
    /// Child of a configurable product.
    Variant,
}

impl ProductType {
    /// Stored/feed spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Configurable => "configurable",
            ProductType::Grouped => "grouped",
            ProductType::Variant => "variant",
        }
    }

    /// Composite types need their children present before import completes.
    pub const fn is_composite(self) -> bool {
        matches!(self, ProductType::Configurable | ProductType::Grouped)
    }

    /// Variants are only shown through their parent.
    pub const fn has_display_record(self) -> bool {
        !matches!(self, ProductType::Variant)
    }

    /// Check the type-specific shape of a feed record.
    pub fn validate(self, raw: &RawProduct) -> Result<()> {
        if self != ProductType::Configurable {
            return Ok(());
        }
        let options = raw
            .extension_attributes
            .configurable_product_options
            .as_deref()
            .unwrap_or_default();
        if options.is_empty() {
            return Err(CatalogError::validation(
                &raw.sku,
                "configurable product without configurable_product_options",
            ));
        }
        if options.iter().any(|o| o.attribute_code.trim().is_empty()) {
            return Err(CatalogError::validation(
                &raw.sku,
                "configurable option with empty attribute_code",
            ));
        }
        Ok(())
    }

    /// Child SKUs a feed record declares, deduplicated in feed order.
    pub fn import_children(self, raw: &RawProduct) -> Vec<String> {
        let mut children: Vec<String> = match self {
            ProductType::Configurable => raw
                .extension_attributes
                .configurable_product_links
                .clone()
                .unwrap_or_default(),
            ProductType::Grouped => {
                let mut links: Vec<_> = raw
                    .product_links
                    .iter()
                    .filter(|l| l.link_type == ASSOCIATED_LINK)
                    .collect();
                links.sort_by_key(|l| l.position);
                links.into_iter().map(|l| l.linked_product_sku.clone()).collect()
            }
            ProductType::Simple | ProductType::Variant => Vec::new(),
        };
        let mut seen = std::collections::HashSet::new();
        children.retain(|sku| !sku.trim().is_empty() && seen.insert(sku.clone()));
        children
    }

    /// Price label as a storefront would render it.
    pub fn format_price(self, price: Option<f64>, currency: &str) -> String {
        match (self, price) {
            (_, None) => "price on request".to_string(),
            (ProductType::Simple | ProductType::Variant, Some(p)) => format!("{currency} {p:.2}"),
            (ProductType::Configurable | ProductType::Grouped, Some(p)) => {
                format!("from {currency} {p:.2}")
            }
        }
    }

    /// Build a cart line for `quantity` units of `item`.
    ///
    /// Composites must be resolved to a concrete child first.
    pub fn cart_line(self, item: &CatalogItem, quantity: u32) -> Result<CartLine> {
        match self {
            ProductType::Simple | ProductType::Variant => Ok(CartLine {
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity,
                unit_price: item.special_price.or(item.price),
            }),
            ProductType::Configurable | ProductType::Grouped => Err(CatalogError::NotPurchasable {
                sku: item.sku.clone(),
                product_type: self.as_str(),
            }),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ProductType::Simple),
            "configurable" => Ok(ProductType::Configurable),
            "grouped" => Ok(ProductType::Grouped),
            "variant" => Ok(ProductType::Variant),
            other => Err(format!("unsupported product type '{other}'")),
        }
    }
}

/// A purchasable line derived from a concrete product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    /// Concrete SKU.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Units.
    pub quantity: u32,
    /// Effective unit price (special price wins over base price).
    pub unit_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{RawConfigurableOption, RawExtension, RawProductLink};

    fn link(sku: &str, position: i32, link_type: &str) -> RawProductLink {
        RawProductLink {
            link_type: link_type.into(),
            linked_product_sku: sku.into(),
            position,
        }
    }

    #[test]
    fn parses_known_tags_only() {
        assert_eq!("Configurable".parse::<ProductType>(), Ok(ProductType::Configurable));
        assert!("bundle".parse::<ProductType>().is_err());
    }

    #[test]
    fn grouped_children_follow_link_position() {
        let raw = RawProduct {
            sku: "SET".into(),
            product_links: vec![
                link("B", 2, ASSOCIATED_LINK),
                link("X", 0, "related"),
                link("A", 1, ASSOCIATED_LINK),
                link("A", 3, ASSOCIATED_LINK),
            ],
            ..Default::default()
        };
        assert_eq!(ProductType::Grouped.import_children(&raw), vec!["A", "B"]);
        assert!(ProductType::Simple.import_children(&raw).is_empty());
    }

    #[test]
    fn configurable_requires_options() {
        let mut raw = RawProduct {
            sku: "TEE".into(),
            ..Default::default()
        };
        assert!(ProductType::Configurable.validate(&raw).is_err());

        raw.extension_attributes = RawExtension {
            configurable_product_options: Some(vec![RawConfigurableOption {
                attribute_code: "color".into(),
                position: 0,
                values: vec![],
            }]),
            configurable_product_links: None,
        };
        assert!(ProductType::Configurable.validate(&raw).is_ok());
    }

    #[test]
    fn price_labels() {
        assert_eq!(ProductType::Simple.format_price(Some(9.5), "EUR"), "EUR 9.50");
        assert_eq!(
            ProductType::Configurable.format_price(Some(12.0), "EUR"),
            "from EUR 12.00"
        );
        assert_eq!(ProductType::Grouped.format_price(None, "EUR"), "price on request");
    }
}
