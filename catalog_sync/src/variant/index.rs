//! The combination index of one configurable product.
//!
//! [`VariantIndex::build`] walks the parent's children once and produces both
//! representations from the same entry list:
//!
//! - a flat map from full combination key to child SKU, used by [`VariantIndex::resolve`];
//! - a narrowing tree with one attribute per level and child SKUs at the leaves, used by
//!   [`VariantIndex::step`] and [`VariantIndex::narrow`].
//!
//! A combination key concatenates `code|value||` for every selected code in resolved
//! attribute order, so `{size: M, color: red}` and `{color: red, size: M}` produce the
//! same key.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::order::VariantOrdering;
use crate::models::{AttributeOption, CatalogItem};

/// Attribute code -> option id.
pub type Selection = BTreeMap<String, String>;

/// Option labels and weights of one language.
#[derive(Debug, Clone, Default)]
pub struct OptionDictionary {
    entries: HashMap<(String, String), (String, i32)>,
}

impl OptionDictionary {
    /// Index dictionary rows by (attribute code, option id).
    pub fn from_options(options: impl IntoIterator<Item = AttributeOption>) -> Self {
        let entries = options
            .into_iter()
            .map(|o| ((o.attribute_code, o.option_id), (o.label, o.weight)))
            .collect();
        Self { entries }
    }

    /// Label of an option, if known.
    pub fn label(&self, code: &str, option_id: &str) -> Option<&str> {
        self.entries
            .get(&(code.to_string(), option_id.to_string()))
            .map(|(label, _)| label.as_str())
    }

    /// Sort weight of an option, if known.
    pub fn weight(&self, code: &str, option_id: &str) -> Option<i32> {
        self.entries
            .get(&(code.to_string(), option_id.to_string()))
            .map(|(_, weight)| *weight)
    }
}

/// One selectable option of an attribute, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOption {
    /// Option id as stored in child attribute bags.
    pub id: String,
    /// Dictionary label, or the id when the dictionary has none.
    pub label: String,
}

/// A level of the narrowing tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantNode {
    /// All attributes chosen.
    Sku(String),
    /// Option id -> subtree for the next attribute, in display order.
    Choice(IndexMap<String, VariantNode>),
}

/// Result of walking the tree with a (partial) selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The selection identifies a child.
    Resolved(String),
    /// The next attribute to choose and its remaining option ids.
    Choose {
        /// Attribute code.
        code: String,
        /// Valid option ids given the earlier choices.
        options: Vec<String>,
    },
    /// An earlier choice has no matching child.
    Unavailable,
}

/// Combination index for one (parent SKU, language).
#[derive(Debug, Clone)]
pub struct VariantIndex {
    parent_sku: String,
    language: String,
    codes: Vec<String>,
    declared_children: Vec<String>,
    entries: Vec<(String, Vec<String>)>,
    combos: HashMap<String, String>,
    tree: VariantNode,
    options: IndexMap<String, Vec<VariantOption>>,
    excluded: Vec<String>,
}

impl VariantIndex {
    /// Build the index of `parent` from its stored `children`.
    ///
    /// Children missing a value for a declared code, or repeating an earlier child's
    /// combination, are excluded and logged.
    pub fn build(
        parent: &CatalogItem,
        children: &[CatalogItem],
        ordering: &VariantOrdering,
        dictionary: &OptionDictionary,
    ) -> Self {
        let codes = ordering.order_codes(&parent.attribute_set, &parent.configurable_options);

        let mut entries: Vec<(String, Vec<String>)> = Vec::with_capacity(children.len());
        let mut combos = HashMap::with_capacity(children.len());
        let mut excluded = Vec::new();

        if codes.is_empty() {
            warn!(parent = %parent.sku, "configurable product declares no attributes");
        }
        for child in children.iter().filter(|_| !codes.is_empty()) {
            let values: Option<Vec<String>> = codes
                .iter()
                .map(|code| child.attribute(code).map(str::to_string))
                .collect();
            let Some(values) = values else {
                warn!(
                    parent = %parent.sku,
                    child = %child.sku,
                    "child lacks a value for a declared attribute; excluded from variant index"
                );
                excluded.push(child.sku.clone());
                continue;
            };
            let key = key_of(codes.iter().map(String::as_str).zip(values.iter().map(String::as_str)));
            if let Some(first) = combos.get(&key) {
                warn!(
                    parent = %parent.sku,
                    child = %child.sku,
                    kept = %first,
                    "duplicate attribute combination; excluded from variant index"
                );
                excluded.push(child.sku.clone());
                continue;
            }
            combos.insert(key, child.sku.clone());
            entries.push((child.sku.clone(), values));
        }

        let options = option_lists(parent, &codes, &entries, ordering, dictionary);

        // Insert in display order so every tree level lists options in that order.
        let rank: Vec<HashMap<&str, usize>> = codes
            .iter()
            .map(|code| {
                options[code]
                    .iter()
                    .enumerate()
                    .map(|(i, o)| (o.id.as_str(), i))
                    .collect()
            })
            .collect();
        let mut sorted: Vec<&(String, Vec<String>)> = entries.iter().collect();
        sorted.sort_by_key(|(_, values)| {
            values
                .iter()
                .zip(&rank)
                .map(|(v, r)| r.get(v.as_str()).copied().unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
        });
        let mut tree = VariantNode::Choice(IndexMap::new());
        for (sku, values) in sorted {
            insert(&mut tree, values, sku);
        }

        debug!(
            parent = %parent.sku,
            language = %parent.language,
            combinations = combos.len(),
            excluded = excluded.len(),
            "variant index built"
        );

        Self {
            parent_sku: parent.sku.clone(),
            language: parent.language.clone(),
            codes,
            declared_children: parent.children.clone(),
            entries,
            combos,
            tree,
            options,
            excluded,
        }
    }

    /// Parent SKU.
    pub fn parent_sku(&self) -> &str {
        &self.parent_sku
    }

    /// Language of the indexed translations.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Attribute codes in resolution order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Child SKUs left out of the index.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Number of indexed combinations.
    pub fn len(&self) -> usize {
        self.combos.len()
    }

    /// True when no child made it into the index.
    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Canonical key of a (partial) selection. Codes outside the index are ignored.
    pub fn combination_key<'a>(&self, selection: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let chosen: HashMap<&str, &str> = selection.into_iter().collect();
        key_of(
            self.codes
                .iter()
                .filter_map(|code| chosen.get(code.as_str()).map(|v| (code.as_str(), *v))),
        )
    }

    /// The child matching a full selection. `None` for partial or unknown combinations.
    pub fn resolve(&self, selection: &Selection) -> Option<&str> {
        if !self.codes.iter().all(|c| selection.contains_key(c)) {
            return None;
        }
        let key = self.combination_key(selection.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.combos.get(&key).map(String::as_str)
    }

    /// Remaining valid option ids for every attribute not set in `selection`.
    pub fn narrow(&self, selection: &Selection) -> BTreeMap<String, BTreeSet<String>> {
        let fixed: Vec<(usize, &String)> = self
            .codes
            .iter()
            .enumerate()
            .filter_map(|(i, code)| selection.get(code).map(|v| (i, v)))
            .collect();

        let mut out: BTreeMap<String, BTreeSet<String>> = self
            .codes
            .iter()
            .filter(|c| !selection.contains_key(*c))
            .map(|c| (c.clone(), BTreeSet::new()))
            .collect();

        for (_, values) in &self.entries {
            if fixed.iter().any(|(i, v)| &values[*i] != *v) {
                continue;
            }
            for (i, code) in self.codes.iter().enumerate() {
                if let Some(set) = out.get_mut(code) {
                    set.insert(values[i].clone());
                }
            }
        }
        out
    }

    /// Walk the narrowing tree in resolution order.
    pub fn step(&self, selection: &Selection) -> Step {
        let mut node = &self.tree;
        for code in &self.codes {
            let VariantNode::Choice(children) = node else {
                break;
            };
            if children.is_empty() {
                return Step::Unavailable;
            }
            match selection.get(code) {
                Some(value) => match children.get(value) {
                    Some(next) => node = next,
                    None => return Step::Unavailable,
                },
                None => {
                    return Step::Choose {
                        code: code.clone(),
                        options: children.keys().cloned().collect(),
                    };
                }
            }
        }
        match node {
            VariantNode::Sku(sku) => Step::Resolved(sku.clone()),
            VariantNode::Choice(_) => Step::Unavailable,
        }
    }

    /// Options of one attribute in display order, restricted to indexed children.
    pub fn options(&self, code: &str) -> &[VariantOption] {
        self.options.get(code).map(Vec::as_slice).unwrap_or_default()
    }

    /// The narrowing tree.
    pub fn tree(&self) -> &VariantNode {
        &self.tree
    }

    /// Whether a write to `sku` can change this index.
    pub fn touches(&self, sku: &str) -> bool {
        self.parent_sku == sku || self.declared_children.iter().any(|c| c == sku)
    }
}

fn key_of<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut key = String::new();
    for (code, value) in pairs {
        key.push_str(code);
        key.push('|');
        key.push_str(value);
        key.push_str("||");
    }
    key
}

fn insert(node: &mut VariantNode, values: &[String], sku: &str) {
    let VariantNode::Choice(children) = node else {
        return;
    };
    match values {
        [] => {}
        [last] => {
            children
                .entry(last.clone())
                .or_insert_with(|| VariantNode::Sku(sku.to_string()));
        }
        [first, rest @ ..] => {
            let next = children
                .entry(first.clone())
                .or_insert_with(|| VariantNode::Choice(IndexMap::new()));
            insert(next, rest, sku);
        }
    }
}

/// Per-code option lists of values used by at least one indexed child.
///
/// Sortable codes order by dictionary weight (unknown weights last); the rest follow
/// the parent's declared value order. Ties and undeclared values keep first-seen order.
fn option_lists(
    parent: &CatalogItem,
    codes: &[String],
    entries: &[(String, Vec<String>)],
    ordering: &VariantOrdering,
    dictionary: &OptionDictionary,
) -> IndexMap<String, Vec<VariantOption>> {
    let mut out = IndexMap::with_capacity(codes.len());
    for (i, code) in codes.iter().enumerate() {
        let mut used: Vec<&str> = Vec::new();
        for (_, values) in entries {
            if !used.contains(&values[i].as_str()) {
                used.push(&values[i]);
            }
        }

        let declared: &[String] = parent
            .configurable_options
            .iter()
            .find(|a| &a.code == code)
            .map(|a| a.values.as_slice())
            .unwrap_or_default();
        let position = |id: &str| declared.iter().position(|d| d == id).unwrap_or(usize::MAX);

        if ordering.is_sortable(code) {
            used.sort_by_key(|id| (dictionary.weight(code, id).unwrap_or(i32::MAX), position(*id)));
        } else {
            used.sort_by_key(|id| position(*id));
        }

        let list = used
            .into_iter()
            .map(|id| VariantOption {
                id: id.to_string(),
                label: dictionary.label(code, id).unwrap_or(id).to_string(),
            })
            .collect();
        out.insert(code.clone(), list);
    }
    out
}
