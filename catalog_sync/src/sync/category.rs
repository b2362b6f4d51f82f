//! Category tree synchronization and orphan handling.

use std::collections::{BTreeSet, HashSet};

use diesel::SqliteConnection;
use tracing::{debug, info, warn};

use super::{Outcome, SyncResult};
use crate::error::Result;
use crate::events::{CatalogEvent, EventSink, SyncScope};
use crate::feed::{CatalogSource, RawCategory, StoreContext};
use crate::lock::{LockKey, LockManager};
use crate::models::{CategoryNode, CategoryNodeChanges};
use crate::store::categories;
use crate::tz;

/// Mirrors a remote category tree into the catalog store.
pub struct CategorySynchronizer<'a> {
    locks: &'a LockManager,
    events: &'a dyn EventSink,
    implicit_root_levels: u32,
}

impl<'a> CategorySynchronizer<'a> {
    /// Synchronizer skipping the top `implicit_root_levels` levels of every tree.
    pub fn new(locks: &'a LockManager, events: &'a dyn EventSink, implicit_root_levels: u32) -> Self {
        Self {
            locks,
            events,
            implicit_root_levels,
        }
    }

    /// Fetch the tree for `ctx` from `source` and synchronize it.
    pub fn synchronize_from(
        &self,
        conn: &mut SqliteConnection,
        source: &dyn CatalogSource,
        ctx: &StoreContext,
    ) -> anyhow::Result<SyncResult> {
        let root = source.fetch_categories(ctx)?;
        Ok(self.synchronize_tree(conn, &root, ctx))
    }

    /// Depth-first reconciliation of `root` into the `ctx` translation.
    ///
    /// Each stored node gets its parent pointer overwritten. Hierarchy edges whose child
    /// left the remote node are tombstoned before the walk descends.
    pub fn synchronize_tree(
        &self,
        conn: &mut SqliteConnection,
        root: &RawCategory,
        ctx: &StoreContext,
    ) -> SyncResult {
        let mut result = SyncResult::default();
        self.walk(conn, root, None, 0, ctx, &mut result);

        let counts = result.counts();
        info!(
            language = %ctx.language,
            created = counts.created,
            updated = counts.updated,
            unchanged = counts.unchanged,
            failed = counts.failed,
            "category sync finished"
        );
        self.events.emit(CatalogEvent::SyncCompleted {
            scope: SyncScope::Categories,
            counts,
            affected: result.affected(),
        });
        result
    }

    fn walk(
        &self,
        conn: &mut SqliteConnection,
        node: &RawCategory,
        parent: Option<i64>,
        depth: u32,
        ctx: &StoreContext,
        result: &mut SyncResult,
    ) {
        if depth < self.implicit_root_levels {
            debug!(id = node.id, depth, "skipping implicit root");
            for child in &node.children_data {
                self.walk(conn, child, None, depth + 1, ctx, result);
            }
            return;
        }

        let key = node.id.to_string();
        match self.save_node(conn, node, parent, ctx) {
            Ok(outcome) => {
                let reason = match outcome {
                    Outcome::Created => "created",
                    Outcome::Updated => "updated",
                    _ => "unchanged",
                };
                result.record(key, outcome, reason);
            }
            Err(e) => {
                warn!(id = node.id, error = %e, "category sync failed");
                result.record(key, Outcome::Failed, e.to_string());
            }
        }

        for child in &node.children_data {
            self.walk(conn, child, Some(node.id), depth + 1, ctx, result);
        }
    }

    /// Save one node and its outgoing edges under the node's lock.
    fn save_node(
        &self,
        conn: &mut SqliteConnection,
        node: &RawCategory,
        parent: Option<i64>,
        ctx: &StoreContext,
    ) -> Result<Outcome> {
        let _guard = self.locks.acquire(&LockKey::category(node.id))?;

        let changes = CategoryNodeChanges {
            remote_id: node.id,
            language: ctx.language.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            parent_remote_id: parent,
            position: node.position,
            is_active: node.is_active,
            in_menu: node.include_in_menu,
            updated_at: tz::now_rfc3339_millis(),
        };
        let children: Vec<(i64, i32)> = node
            .children_data
            .iter()
            .map(|c| (c.id, c.position))
            .collect();
        let keep: Vec<i64> = children.iter().map(|(id, _)| *id).collect();

        conn.immediate_transaction(|conn| {
            let outcome = categories::upsert_category(conn, &changes)?;
            let dropped = categories::tombstone_missing_children(conn, node.id, &keep)?;
            let moved = categories::tombstone_other_parents(conn, node.id, parent)?;
            if dropped + moved > 0 {
                debug!(id = node.id, dropped, moved, "category edges tombstoned");
            }
            categories::upsert_edges(conn, node.id, &children)?;
            Ok(Outcome::from(outcome))
        })
    }

    /// Stored categories of `language` the run did not see. Nodes the run visited but
    /// failed to save are still in the remote tree and never count as orphans.
    pub fn orphan_categories(
        &self,
        conn: &mut SqliteConnection,
        result: &SyncResult,
        language: &str,
    ) -> Result<OrphanCategories> {
        let seen: HashSet<&str> = result.visited().collect();
        let nodes: Vec<CategoryNode> = categories::list_categories(conn, language)?
            .into_iter()
            .filter(|n| !seen.contains(n.remote_id.to_string().as_str()))
            .collect();
        if !nodes.is_empty() {
            info!(language, orphans = nodes.len(), "orphan categories found");
        }
        Ok(OrphanCategories {
            language: language.to_string(),
            nodes,
        })
    }

    /// Delete confirmed orphans, each under its own lock. Edges touching a category are
    /// tombstoned once its last translation is gone.
    pub fn delete_confirmed(
        &self,
        conn: &mut SqliteConnection,
        confirmed: ConfirmedDeletion,
    ) -> SyncResult {
        let mut result = SyncResult::default();
        for id in confirmed.ids {
            match self.delete_node(conn, id, &confirmed.language) {
                Ok(0) => result.record(id.to_string(), Outcome::Ignored, "already gone"),
                Ok(_) => result.record(id.to_string(), Outcome::Deleted, "orphan deleted"),
                Err(e) => {
                    warn!(id, error = %e, "category delete failed");
                    result.record(id.to_string(), Outcome::Failed, e.to_string());
                }
            }
        }
        self.events.emit(CatalogEvent::SyncCompleted {
            scope: SyncScope::Categories,
            counts: result.counts(),
            affected: result.affected(),
        });
        result
    }

    fn delete_node(&self, conn: &mut SqliteConnection, id: i64, language: &str) -> Result<usize> {
        let _guard = self.locks.acquire(&LockKey::category(id))?;
        conn.immediate_transaction(|conn| {
            let removed = categories::delete_category(conn, id, language)?;
            if removed > 0 && !categories::has_any_category_translation(conn, id)? {
                categories::tombstone_all_edges(conn, id)?;
            }
            Ok(removed)
        })
    }
}

/// Stored categories a sync run did not see. Nothing is deleted until the set is
/// confirmed and passed to [`CategorySynchronizer::delete_confirmed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCategories {
    language: String,
    nodes: Vec<CategoryNode>,
}

impl OrphanCategories {
    /// Orphaned nodes, ordered by remote id.
    pub fn nodes(&self) -> &[CategoryNode] {
        &self.nodes
    }

    /// Remote ids of the orphans.
    pub fn ids(&self) -> BTreeSet<i64> {
        self.nodes.iter().map(|n| n.remote_id).collect()
    }

    /// Number of orphaned nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the run saw every stored category.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keep only orphans matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&CategoryNode) -> bool) {
        self.nodes.retain(keep);
    }

    /// Approve deleting every remaining orphan.
    pub fn confirm(self) -> ConfirmedDeletion {
        let ids = self.ids().into_iter().collect();
        ConfirmedDeletion {
            language: self.language,
            ids,
        }
    }
}

/// Deletion approved through [`OrphanCategories::confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedDeletion {
    language: String,
    ids: Vec<i64>,
}

impl ConfirmedDeletion {
    /// Remote ids to delete.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }
}
