//! Diesel models mapping to the catalog schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`]:
//! - [`crate::schema::catalog_item`]: one row per (SKU, language) translation
//! - [`crate::schema::display_record`]: storefront-facing record per item family
//! - [`crate::schema::attribute_option`]: option label dictionary
//! - [`crate::schema::category_node`] / [`crate::schema::category_edge`]: category tree
//! - [`crate::schema::stock_record`]: language-independent stock per SKU
//!
//! List-valued columns (attribute bag, links, children, configurable options) are JSON
//! text. Row structs keep them as `String`; [`catalog::CatalogItem`] is the decoded view.

pub mod catalog;
pub mod category;
pub mod stock;

pub use catalog::{
    AttributeOption, CatalogItem, CatalogItemChanges, CatalogItemRow, ConfigurableAttribute,
    DisplayRecord, DisplayRecordChanges, ProductLinks,
};
pub use category::{CategoryEdge, CategoryNode, CategoryNodeChanges};
pub use stock::StockRecord;
