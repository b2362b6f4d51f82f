//! Raw feed records as the remote backend delivers them.
//!
//! Field names follow the backend's REST payloads (`type_id`, `custom_attributes`,
//! `extension_attributes`, `children_data`, ...). Aliases cover the older flat shapes
//! (`type`, `qty`, `status`, `children`). Unknown fields are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend status code for an enabled product.
pub const STATUS_ENABLED: i32 = 1;
/// Backend visibility code for "not visible individually".
pub const VISIBILITY_NOT_VISIBLE: i32 = 1;
/// Backend visibility code for "catalog, search".
pub const VISIBILITY_BOTH: i32 = 4;

fn default_status() -> i32 {
    STATUS_ENABLED
}

fn default_visibility() -> i32 {
    VISIBILITY_BOTH
}

fn default_true() -> bool {
    true
}

/// One product as returned by the backend product listing.
///
/// [`Default`] matches what deserializing `{}` yields: enabled and visible.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawProduct {
    /// SKU code; validated non-empty by the synchronizer.
    #[serde(default)]
    pub sku: String,
    /// Type tag: `simple`, `configurable`, `grouped`, `variant` (others are ignored).
    #[serde(default, alias = "type")]
    pub type_id: String,
    /// `1` = enabled, anything else = disabled.
    #[serde(default = "default_status")]
    pub status: i32,
    /// `1` = not visible individually, `2..=4` = visible somewhere.
    #[serde(default = "default_visibility")]
    pub visibility: i32,
    /// Store-level product name.
    #[serde(default)]
    pub name: String,
    /// Base price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Attribute set name, used to pick the variant attribute weight table.
    #[serde(default, deserialize_with = "opt_scalar_string")]
    pub attribute_set: Option<String>,
    /// Free-form attribute bag.
    #[serde(default)]
    pub custom_attributes: Vec<RawAttribute>,
    /// Composite-specific payload.
    #[serde(default)]
    pub extension_attributes: RawExtension,
    /// Crosssell/upsell/related/associated links.
    #[serde(default)]
    pub product_links: Vec<RawProductLink>,
    /// Store the record was fetched for.
    #[serde(default)]
    pub store_id: Option<i64>,
}

impl Default for RawProduct {
    fn default() -> Self {
        Self {
            sku: String::new(),
            type_id: String::new(),
            status: default_status(),
            visibility: default_visibility(),
            name: String::new(),
            price: None,
            attribute_set: None,
            custom_attributes: Vec::new(),
            extension_attributes: RawExtension::default(),
            product_links: Vec::new(),
            store_id: None,
        }
    }
}

impl RawProduct {
    /// Look up a custom attribute's raw JSON value by normalized code.
    pub fn attribute(&self, code: &str) -> Option<&Value> {
        let code = normalize_code(code);
        self.custom_attributes
            .iter()
            .find(|a| normalize_code(&a.attribute_code) == code)
            .map(|a| &a.value)
    }
}

/// Canonical spelling of an attribute code: trimmed and lowercased. Every stored code
/// (attribute bags, configurable axes, option dictionary) goes through this.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// `{attribute_code, value}` pair of the attribute bag.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawAttribute {
    /// Attribute code, e.g. `color`.
    pub attribute_code: String,
    /// Scalar or list value.
    #[serde(default)]
    pub value: Value,
}

/// The `extension_attributes` object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawExtension {
    /// Declared variant axes of a configurable product.
    #[serde(default)]
    pub configurable_product_options: Option<Vec<RawConfigurableOption>>,
    /// Child SKUs of a configurable product.
    #[serde(default)]
    pub configurable_product_links: Option<Vec<String>>,
}

/// One variant axis of a configurable product.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawConfigurableOption {
    /// Attribute code of the axis, e.g. `size`.
    #[serde(alias = "code")]
    pub attribute_code: String,
    /// Sort position among the product's axes.
    #[serde(default)]
    pub position: i32,
    /// Declared option values, in import order.
    #[serde(default)]
    pub values: Vec<RawOptionValue>,
}

/// One declared value of a variant axis.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawOptionValue {
    /// Option id (numeric in most backends, kept as text).
    #[serde(deserialize_with = "scalar_string")]
    pub value_index: String,
}

/// A typed product link.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawProductLink {
    /// `crosssell`, `upsell`, `related` or `associated`.
    pub link_type: String,
    /// Target SKU.
    pub linked_product_sku: String,
    /// Display position.
    #[serde(default)]
    pub position: i32,
}

/// One category tree node with its children inline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawCategory {
    /// Remote category id (natural key).
    #[serde(alias = "category_id")]
    pub id: i64,
    /// Display name for the fetched store language.
    #[serde(default)]
    pub name: String,
    /// Whether the category is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Whether the category appears in navigation menus.
    #[serde(default = "default_true", alias = "in_menu")]
    pub include_in_menu: bool,
    /// Optional long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Sort position under its parent.
    #[serde(default)]
    pub position: i32,
    /// Child nodes.
    #[serde(default, alias = "children")]
    pub children_data: Vec<RawCategory>,
}

/// Stock push for one SKU.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawStock {
    /// SKU code.
    pub sku: String,
    /// Quantity on hand; fractional quantities are truncated.
    #[serde(alias = "qty")]
    pub quantity: f64,
    /// In-stock flag, either a boolean or `0`/`1`.
    #[serde(alias = "status", deserialize_with = "bool_or_int")]
    pub is_in_stock: bool,
}

/// Dictionary entry for an attribute option label.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawAttributeOption {
    /// Attribute code, e.g. `color`.
    pub attribute_code: String,
    /// Option id as it appears in product attribute values.
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
    /// Human-readable label for the fetched store language.
    pub label: String,
    /// Sort weight; lower sorts first.
    #[serde(default)]
    pub sort_order: i32,
}

/// Render a scalar JSON value as the text stored in attribute bags.
///
/// Strings are kept, numbers use their JSON spelling, booleans become `1`/`0`,
/// arrays are joined with `,`. `null` and objects have no text form.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            Some(parts.join(","))
        }
        Value::Null | Value::Object(_) => None,
    }
}

fn scalar_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    match v {
        Value::String(_) | Value::Number(_) => {
            Ok(value_to_text(&v).unwrap_or_default())
        }
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

fn opt_scalar_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(de)?;
    Ok(v.as_ref().and_then(value_to_text))
}

fn bool_or_int<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|x| x != 0.0)),
        Value::String(s) => Ok(matches!(s.trim(), "1" | "true")),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean or 0/1, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_defaults_and_aliases() {
        let p: RawProduct = serde_json::from_value(json!({
            "sku": "TSHIRT",
            "type": "configurable",
            "attribute_set": 9,
            "extension_attributes": {
                "configurable_product_options": [
                    {"attribute_code": "color", "position": 0, "values": [{"value_index": 5}, {"value_index": "6"}]}
                ],
                "configurable_product_links": ["TSHIRT-RED"]
            }
        }))
        .unwrap();

        assert_eq!(p.type_id, "configurable");
        assert_eq!(p.status, STATUS_ENABLED);
        assert_eq!(p.visibility, VISIBILITY_BOTH);
        assert_eq!(p.attribute_set.as_deref(), Some("9"));
        let opts = p.extension_attributes.configurable_product_options.unwrap();
        assert_eq!(opts[0].values[0].value_index, "5");
        assert_eq!(opts[0].values[1].value_index, "6");
    }

    #[test]
    fn built_default_matches_empty_payload() {
        let parsed: RawProduct = serde_json::from_value(json!({})).unwrap();
        assert_eq!(RawProduct::default(), parsed);
        assert_eq!(RawProduct::default().status, STATUS_ENABLED);
    }

    #[test]
    fn stock_accepts_legacy_field_names() {
        let s: RawStock = serde_json::from_value(json!({"sku": "A", "qty": 3.0, "status": 1})).unwrap();
        assert_eq!(s.quantity, 3.0);
        assert!(s.is_in_stock);

        let s: RawStock =
            serde_json::from_value(json!({"sku": "A", "quantity": 0, "is_in_stock": false})).unwrap();
        assert!(!s.is_in_stock);
    }

    #[test]
    fn category_tree_accepts_children_alias() {
        let c: RawCategory = serde_json::from_value(json!({
            "category_id": 2, "name": "Default", "children": [{"id": 3, "name": "Shirts"}]
        }))
        .unwrap();
        assert_eq!(c.id, 2);
        assert_eq!(c.children_data.len(), 1);
        assert!(c.children_data[0].is_active);
    }

    #[test]
    fn value_to_text_renders_scalars() {
        assert_eq!(value_to_text(&json!("red")).as_deref(), Some("red"));
        assert_eq!(value_to_text(&json!(12)).as_deref(), Some("12"));
        assert_eq!(value_to_text(&json!(true)).as_deref(), Some("1"));
        assert_eq!(value_to_text(&json!(["3", 4])).as_deref(), Some("3,4"));
        assert_eq!(value_to_text(&Value::Null), None);
    }
}
