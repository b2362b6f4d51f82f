//! Catalog item, display record and attribute option models.

use std::collections::BTreeMap;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::product_type::ProductType;
use crate::schema::{attribute_option, catalog_item, display_record};

// ----------------------- catalog_item -------------------

/// A raw row of [`crate::schema::catalog_item`](crate::schema::catalog_item).
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = catalog_item, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CatalogItemRow {
    /// Row id; the lowest id wins when a (sku, language) pair is duplicated.
    pub id: i32,
    /// SKU code.
    pub sku: String,
    /// Translation language.
    pub language: String,
    /// Remote store id the translation came from.
    pub store_id: i64,
    /// Product type tag.
    pub product_type: String,
    /// Product name.
    pub name: String,
    /// Backend status is enabled.
    pub enabled: bool,
    /// Backend visibility is anything but "not visible individually".
    pub visible: bool,
    /// Base price.
    pub price: Option<f64>,
    /// Special price.
    pub special_price: Option<f64>,
    /// Attribute set name.
    pub attribute_set: String,
    /// JSON object of attribute code -> text value.
    pub attributes: String,
    /// JSON array of crosssell SKUs.
    pub crosssell: String,
    /// JSON array of upsell SKUs.
    pub upsell: String,
    /// JSON array of related SKUs.
    pub related: String,
    /// JSON array of child SKUs.
    pub children: String,
    /// JSON array of [`ConfigurableAttribute`].
    pub configurable_options: String,
    /// Last write (RFC-3339 UTC).
    pub updated_at: String,
}

/// Insert/update payload for [`crate::schema::catalog_item`].
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = catalog_item, treat_none_as_null = true)]
pub struct CatalogItemChanges {
    pub sku: String,
    pub language: String,
    pub store_id: i64,
    pub product_type: String,
    pub name: String,
    pub enabled: bool,
    pub visible: bool,
    pub price: Option<f64>,
    pub special_price: Option<f64>,
    pub attribute_set: String,
    pub attributes: String,
    pub crosssell: String,
    pub upsell: String,
    pub related: String,
    pub children: String,
    pub configurable_options: String,
    pub updated_at: String,
}

impl CatalogItemChanges {
    /// Encode a decoded item view back into column values.
    pub fn from_item(item: &CatalogItem) -> Result<Self> {
        Ok(Self {
            sku: item.sku.clone(),
            language: item.language.clone(),
            store_id: item.store_id,
            product_type: item.product_type.as_str().to_string(),
            name: item.name.clone(),
            enabled: item.enabled,
            visible: item.visible,
            price: item.price,
            special_price: item.special_price,
            attribute_set: item.attribute_set.clone(),
            attributes: serde_json::to_string(&item.attributes)?,
            crosssell: serde_json::to_string(&item.links.crosssell)?,
            upsell: serde_json::to_string(&item.links.upsell)?,
            related: serde_json::to_string(&item.links.related)?,
            children: serde_json::to_string(&item.children)?,
            configurable_options: serde_json::to_string(&item.configurable_options)?,
            updated_at: item.updated_at.clone(),
        })
    }

    /// True when writing `self` over `row` would change nothing but `updated_at`.
    pub fn same_content(&self, row: &CatalogItemRow) -> bool {
        self.sku == row.sku
            && self.language == row.language
            && self.store_id == row.store_id
            && self.product_type == row.product_type
            && self.name == row.name
            && self.enabled == row.enabled
            && self.visible == row.visible
            && self.price == row.price
            && self.special_price == row.special_price
            && self.attribute_set == row.attribute_set
            && self.attributes == row.attributes
            && self.crosssell == row.crosssell
            && self.upsell == row.upsell
            && self.related == row.related
            && self.children == row.children
            && self.configurable_options == row.configurable_options
    }
}

/// One declared variant axis of a configurable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurableAttribute {
    /// Attribute code, e.g. `color`.
    pub code: String,
    /// Axis position from the feed.
    pub position: i32,
    /// Declared option ids in import order.
    pub values: Vec<String>,
}

/// Linked SKU lists, each in feed position order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLinks {
    pub crosssell: Vec<String>,
    pub upsell: Vec<String>,
    pub related: Vec<String>,
}

/// Decoded view of a [`CatalogItemRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: i32,
    pub sku: String,
    pub language: String,
    pub store_id: i64,
    pub product_type: ProductType,
    pub name: String,
    pub enabled: bool,
    pub visible: bool,
    pub price: Option<f64>,
    pub special_price: Option<f64>,
    pub attribute_set: String,
    pub attributes: BTreeMap<String, String>,
    pub links: ProductLinks,
    pub children: Vec<String>,
    pub configurable_options: Vec<ConfigurableAttribute>,
    pub updated_at: String,
}

impl CatalogItem {
    /// Text value of one attribute.
    pub fn attribute(&self, code: &str) -> Option<&str> {
        self.attributes.get(code).map(String::as_str)
    }

    /// Published on the storefront: enabled and visible.
    pub fn is_published(&self) -> bool {
        self.enabled && self.visible
    }
}

impl TryFrom<CatalogItemRow> for CatalogItem {
    type Error = CatalogError;

    fn try_from(row: CatalogItemRow) -> Result<Self> {
        let product_type = row
            .product_type
            .parse::<ProductType>()
            .map_err(|reason| CatalogError::validation(&row.sku, reason))?;
        Ok(Self {
            id: row.id,
            product_type,
            attributes: serde_json::from_str(&row.attributes)?,
            links: ProductLinks {
                crosssell: serde_json::from_str(&row.crosssell)?,
                upsell: serde_json::from_str(&row.upsell)?,
                related: serde_json::from_str(&row.related)?,
            },
            children: serde_json::from_str(&row.children)?,
            configurable_options: serde_json::from_str(&row.configurable_options)?,
            sku: row.sku,
            language: row.language,
            store_id: row.store_id,
            name: row.name,
            enabled: row.enabled,
            visible: row.visible,
            price: row.price,
            special_price: row.special_price,
            attribute_set: row.attribute_set,
            updated_at: row.updated_at,
        })
    }
}

// ----------------------- display_record -----------------

/// A row in [`crate::schema::display_record`]: what the storefront renders for an item
/// family in one language.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = display_record, check_for_backend(diesel::sqlite::Sqlite))]
pub struct DisplayRecord {
    pub id: i32,
    pub sku: String,
    pub language: String,
    pub title: String,
    pub description: Option<String>,
    /// JSON array of remote category ids.
    pub category_ids: String,
    /// `enabled && visible` of the backing item at its last save.
    pub published: bool,
    pub updated_at: String,
}

impl DisplayRecord {
    /// Decoded category references.
    pub fn category_ids(&self) -> Result<Vec<i64>> {
        Ok(serde_json::from_str(&self.category_ids)?)
    }
}

/// Insert/update payload for [`crate::schema::display_record`].
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = display_record, treat_none_as_null = true)]
pub struct DisplayRecordChanges {
    pub sku: String,
    pub language: String,
    pub title: String,
    pub description: Option<String>,
    pub category_ids: String,
    pub published: bool,
    pub updated_at: String,
}

// ----------------------- attribute_option ---------------

/// Dictionary entry in [`crate::schema::attribute_option`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = attribute_option, check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttributeOption {
    pub attribute_code: String,
    pub option_id: String,
    pub language: String,
    pub label: String,
    /// Lower weights sort first for sortable attributes.
    pub weight: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CatalogItemRow {
        CatalogItemRow {
            id: 1,
            sku: "TEE-RED-S".into(),
            language: "en".into(),
            store_id: 1,
            product_type: "variant".into(),
            name: "Tee red S".into(),
            enabled: true,
            visible: false,
            price: Some(10.0),
            special_price: None,
            attribute_set: "clothing".into(),
            attributes: r#"{"color":"red","size":"S"}"#.into(),
            crosssell: "[]".into(),
            upsell: "[]".into(),
            related: r#"["CAP"]"#.into(),
            children: "[]".into(),
            configurable_options: "[]".into(),
            updated_at: "2025-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn decodes_json_columns() {
        let item = CatalogItem::try_from(row()).unwrap();
        assert_eq!(item.product_type, ProductType::Variant);
        assert_eq!(item.attribute("color"), Some("red"));
        assert_eq!(item.links.related, vec!["CAP"]);
        assert!(!item.is_published());
    }

    #[test]
    fn encode_then_compare_ignores_timestamp() {
        let item = CatalogItem::try_from(row()).unwrap();
        let mut changes = CatalogItemChanges::from_item(&item).unwrap();
        changes.updated_at = "2030-01-01T00:00:00.000Z".into();
        assert!(changes.same_content(&row()));

        changes.price = Some(11.0);
        assert!(!changes.same_content(&row()));
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let mut r = row();
        r.children = "not json".into();
        assert!(matches!(CatalogItem::try_from(r), Err(CatalogError::Decode(_))));
    }

    #[test]
    fn variants_make_cart_lines_parents_do_not() {
        let mut item = CatalogItem::try_from(row()).unwrap();
        item.special_price = Some(8.0);
        let line = ProductType::Variant.cart_line(&item, 2).unwrap();
        assert_eq!(line.unit_price, Some(8.0));
        assert_eq!(line.quantity, 2);

        assert!(matches!(
            ProductType::Configurable.cart_line(&item, 1),
            Err(CatalogError::NotPurchasable { .. })
        ));
    }
}
