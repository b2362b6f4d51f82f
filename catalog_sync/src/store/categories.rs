//! Category node and edge queries.

use diesel::prelude::*;
use tracing::warn;

use super::WriteOutcome;
use crate::error::Result;
use crate::models::{CategoryEdge, CategoryNode, CategoryNodeChanges};
use crate::schema::category_edge::dsl as ce;
use crate::schema::category_node::dsl as cn;
use crate::tz;

/// The node for (remote_id, language). Duplicates resolve to the lowest row id.
pub fn find_category(
    conn: &mut SqliteConnection,
    remote_id: i64,
    language: &str,
) -> Result<Option<CategoryNode>> {
    let rows: Vec<CategoryNode> = cn::category_node
        .filter(cn::remote_id.eq(remote_id).and(cn::language.eq(language)))
        .order(cn::id.asc())
        .select(CategoryNode::as_select())
        .load(conn)?;
    if rows.len() > 1 {
        warn!(
            remote_id,
            language,
            duplicates = rows.len(),
            "duplicate category key; using first match"
        );
    }
    Ok(rows.into_iter().next())
}

/// Create the node or overwrite the first match, parent pointer included.
pub fn upsert_category(
    conn: &mut SqliteConnection,
    changes: &CategoryNodeChanges,
) -> Result<WriteOutcome> {
    match find_category(conn, changes.remote_id, &changes.language)? {
        None => {
            diesel::insert_into(cn::category_node)
                .values(changes)
                .execute(conn)?;
            Ok(WriteOutcome::Created)
        }
        Some(node) if changes.same_content(&node) => Ok(WriteOutcome::Unchanged),
        Some(node) => {
            diesel::update(cn::category_node.find(node.id))
                .set(changes)
                .execute(conn)?;
            Ok(WriteOutcome::Updated)
        }
    }
}

/// Every node stored for `language`, ordered by remote id then row id.
pub fn list_categories(conn: &mut SqliteConnection, language: &str) -> Result<Vec<CategoryNode>> {
    let rows = cn::category_node
        .filter(cn::language.eq(language))
        .order((cn::remote_id.asc(), cn::id.asc()))
        .select(CategoryNode::as_select())
        .load(conn)?;
    Ok(rows)
}

/// Delete every row of the (remote_id, language) node.
pub fn delete_category(conn: &mut SqliteConnection, remote_id: i64, language: &str) -> Result<usize> {
    let n = diesel::delete(
        cn::category_node.filter(cn::remote_id.eq(remote_id).and(cn::language.eq(language))),
    )
    .execute(conn)?;
    Ok(n)
}

/// Whether any translation of the node remains.
pub fn has_any_category_translation(conn: &mut SqliteConnection, remote_id: i64) -> Result<bool> {
    let found = diesel::select(diesel::dsl::exists(
        cn::category_node.filter(cn::remote_id.eq(remote_id)),
    ))
    .get_result::<bool>(conn)?;
    Ok(found)
}

/// Create or revive the edges `parent -> child` for each `(child, position)`.
pub fn upsert_edges(
    conn: &mut SqliteConnection,
    parent: i64,
    children: &[(i64, i32)],
) -> Result<()> {
    for &(child, position) in children {
        diesel::insert_into(ce::category_edge)
            .values((
                ce::parent_remote_id.eq(parent),
                ce::child_remote_id.eq(child),
                ce::position.eq(position),
                ce::tombstoned_at.eq(None::<String>),
            ))
            .on_conflict((ce::parent_remote_id, ce::child_remote_id))
            .do_update()
            .set((ce::position.eq(position), ce::tombstoned_at.eq(None::<String>)))
            .execute(conn)?;
    }
    Ok(())
}

/// Tombstone live edges below `parent` whose child is not in `keep`.
pub fn tombstone_missing_children(
    conn: &mut SqliteConnection,
    parent: i64,
    keep: &[i64],
) -> Result<usize> {
    let n = diesel::update(
        ce::category_edge
            .filter(ce::parent_remote_id.eq(parent))
            .filter(ce::tombstoned_at.is_null())
            .filter(ce::child_remote_id.ne_all(keep)),
    )
    .set(ce::tombstoned_at.eq(tz::now_rfc3339_millis()))
    .execute(conn)?;
    Ok(n)
}

/// Tombstone live edges into `child` from any parent other than `parent`.
pub fn tombstone_other_parents(
    conn: &mut SqliteConnection,
    child: i64,
    parent: Option<i64>,
) -> Result<usize> {
    let now = tz::now_rfc3339_millis();
    let base = ce::category_edge
        .filter(ce::child_remote_id.eq(child))
        .filter(ce::tombstoned_at.is_null());
    let n = match parent {
        Some(p) => diesel::update(base.filter(ce::parent_remote_id.ne(p)))
            .set(ce::tombstoned_at.eq(now))
            .execute(conn)?,
        None => diesel::update(base).set(ce::tombstoned_at.eq(now)).execute(conn)?,
    };
    Ok(n)
}

/// Tombstone every live edge touching `remote_id`, as parent or child.
pub fn tombstone_all_edges(conn: &mut SqliteConnection, remote_id: i64) -> Result<usize> {
    let n = diesel::update(
        ce::category_edge
            .filter(
                ce::parent_remote_id
                    .eq(remote_id)
                    .or(ce::child_remote_id.eq(remote_id)),
            )
            .filter(ce::tombstoned_at.is_null()),
    )
    .set(ce::tombstoned_at.eq(tz::now_rfc3339_millis()))
    .execute(conn)?;
    Ok(n)
}

/// Every edge below `parent`, live and tombstoned, ordered by position.
pub fn edges_of(conn: &mut SqliteConnection, parent: i64) -> Result<Vec<CategoryEdge>> {
    let rows = ce::category_edge
        .filter(ce::parent_remote_id.eq(parent))
        .order((ce::position.asc(), ce::child_remote_id.asc()))
        .select(CategoryEdge::as_select())
        .load(conn)?;
    Ok(rows)
}

/// Child ids of live edges below `parent`, in position order.
pub fn live_children(conn: &mut SqliteConnection, parent: i64) -> Result<Vec<i64>> {
    let rows = ce::category_edge
        .filter(ce::parent_remote_id.eq(parent))
        .filter(ce::tombstoned_at.is_null())
        .order((ce::position.asc(), ce::child_remote_id.asc()))
        .select(ce::child_remote_id)
        .load(conn)?;
    Ok(rows)
}
