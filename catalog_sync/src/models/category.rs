//! Category tree models.

use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{category_edge, category_node};

/// A row in [`crate::schema::category_node`]: one translation of a remote category.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = category_node, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryNode {
    /// Row id; the lowest id wins when a (remote_id, language) pair is duplicated.
    pub id: i32,
    /// Remote category id (natural key).
    pub remote_id: i64,
    /// Translation language.
    pub language: String,
    /// Display name.
    pub name: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Remote id of the single parent; `None` for roots. Replaced on every sync.
    pub parent_remote_id: Option<i64>,
    /// Sort position under the parent.
    pub position: i32,
    /// Whether the category is active.
    pub is_active: bool,
    /// Whether the category appears in menus.
    pub in_menu: bool,
    /// Last write (RFC-3339 UTC).
    pub updated_at: String,
}

/// Insert/update payload for [`CategoryNode`].
///
/// `None` parents are written as NULL so a moved-to-root node loses its old parent.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = category_node, treat_none_as_null = true)]
pub struct CategoryNodeChanges {
    pub remote_id: i64,
    pub language: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_remote_id: Option<i64>,
    pub position: i32,
    pub is_active: bool,
    pub in_menu: bool,
    pub updated_at: String,
}

impl CategoryNodeChanges {
    /// True when writing `self` over `node` would change nothing but `updated_at`.
    pub fn same_content(&self, node: &CategoryNode) -> bool {
        self.remote_id == node.remote_id
            && self.language == node.language
            && self.name == node.name
            && self.description == node.description
            && self.parent_remote_id == node.parent_remote_id
            && self.position == node.position
            && self.is_active == node.is_active
            && self.in_menu == node.in_menu
    }
}

/// A row in [`crate::schema::category_edge`]. Language independent.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = category_edge, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryEdge {
    pub parent_remote_id: i64,
    pub child_remote_id: i64,
    pub position: i32,
    /// Set when the child left this parent; live edges have `None`.
    pub tombstoned_at: Option<String>,
}
