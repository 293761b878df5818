//! `SQLite` query helpers for the moda store.
//!
//! Every function takes a shared `&Connection` and returns typed structs
//! (never raw rows). Removed items are excluded unless a filter asks for
//! them explicitly.

use anyhow::{Context, Result};
use rusqlite::{Connection, params, params_from_iter, types::Type};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::model::{
    item::{Tier, WorkItemState},
    level::BacklogLevel,
};

/// Upper bound on ids bound into a single `IN (...)` list.
const MAX_BOUND_IDS: usize = 500;

const ITEM_SELECT: &str = "SELECT i.item_id, i.item_key, i.title, l.tier, l.level_order, l.name, \
     i.parent_id, i.status, i.status_category, i.team_code \
     FROM work_items i \
     INNER JOIN backlog_levels l ON l.level_id = i.level_id";

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter criteria for item listings.
///
/// All fields are optional and combine with AND semantics. Empty vectors mean
/// "no restriction".
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Restrict to these tiers.
    pub tiers: Vec<Tier>,
    /// Restrict to items owned by this team code (exact match).
    pub team: Option<String>,
    /// Restrict to these item ids.
    pub ids: Vec<String>,
    /// Include items in the removed status category (default: false).
    pub include_removed: bool,
}

impl ItemFilter {
    /// Items in the given tiers, removed items excluded.
    #[must_use]
    pub fn tiers(tiers: &[Tier]) -> Self {
        Self {
            tiers: tiers.to_vec(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Fetch a single item by exact `item_id`.
///
/// Returns `None` if the item does not exist (or is removed, unless
/// `include_removed` is true).
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_item(
    conn: &Connection,
    item_id: &str,
    include_removed: bool,
) -> Result<Option<WorkItemState>> {
    let sql = if include_removed {
        format!("{ITEM_SELECT} WHERE i.item_id = ?1")
    } else {
        format!("{ITEM_SELECT} WHERE i.item_id = ?1 AND i.status_category <> 'removed'")
    };

    let mut stmt = conn.prepare(&sql).context("prepare get_item query")?;

    match stmt.query_row(params![item_id], row_to_item) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context(format!("get_item for '{item_id}'")),
    }
}

/// List items matching the filter, ordered by level then key.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_items(conn: &Connection, filter: &ItemFilter) -> Result<Vec<WorkItemState>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<String> = Vec::new();

    if !filter.include_removed {
        conditions.push("i.status_category <> 'removed'".to_string());
    }

    if !filter.tiers.is_empty() {
        let start = param_values.len() + 1;
        param_values.extend(filter.tiers.iter().map(|t| t.as_str().to_string()));
        conditions.push(format!("l.tier IN ({})", placeholders(start, filter.tiers.len())));
    }

    if let Some(ref team) = filter.team {
        param_values.push(team.clone());
        conditions.push(format!("i.team_code = ?{}", param_values.len()));
    }

    if !filter.ids.is_empty() {
        let start = param_values.len() + 1;
        param_values.extend(filter.ids.iter().cloned());
        conditions.push(format!("i.item_id IN ({})", placeholders(start, filter.ids.len())));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "{ITEM_SELECT}{where_clause} ORDER BY l.tier ASC, l.level_order ASC, i.item_key ASC, i.item_id ASC"
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare list_items query: {sql}"))?;

    let rows = stmt
        .query_map(params_from_iter(param_values.iter()), row_to_item)
        .context("execute list_items query")?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row.context("read list_items row")?);
    }
    Ok(items)
}

/// Fetch non-removed items in `tiers` whose parent is one of `parent_ids`.
///
/// Large id sets are bound in chunks; results keep parent-then-key order
/// within each chunk.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_children_of(
    conn: &Connection,
    parent_ids: &BTreeSet<String>,
    tiers: &[Tier],
) -> Result<Vec<WorkItemState>> {
    if parent_ids.is_empty() || tiers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<&String> = parent_ids.iter().collect();
    let mut children = Vec::new();

    for chunk in ids.chunks(MAX_BOUND_IDS) {
        let mut param_values: Vec<String> = tiers.iter().map(|t| t.as_str().to_string()).collect();
        let tier_list = placeholders(1, tiers.len());
        let parent_list = placeholders(param_values.len() + 1, chunk.len());
        param_values.extend(chunk.iter().map(|id| (*id).clone()));

        let sql = format!(
            "{ITEM_SELECT} WHERE i.status_category <> 'removed' \
             AND l.tier IN ({tier_list}) AND i.parent_id IN ({parent_list}) \
             ORDER BY i.parent_id ASC, i.item_key ASC, i.item_id ASC"
        );

        let mut stmt = conn.prepare(&sql).context("prepare get_children_of")?;
        let rows = stmt
            .query_map(params_from_iter(param_values.iter()), row_to_item)
            .context("execute get_children_of")?;

        for row in rows {
            children.push(row.context("read child row")?);
        }
    }

    Ok(children)
}

/// Distinct level orders of Portfolio-tier items across the whole store,
/// ascending. Removed items count: the hierarchy shape does not depend on
/// workflow state.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn portfolio_level_orders(conn: &Connection) -> Result<Vec<i32>> {
    let sql = "SELECT DISTINCT l.level_order \
               FROM work_items i \
               INNER JOIN backlog_levels l ON l.level_id = i.level_id \
               WHERE l.tier = 'portfolio' \
               ORDER BY l.level_order ASC";

    let mut stmt = conn.prepare(sql).context("prepare portfolio_level_orders")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i32>(0))
        .context("execute portfolio_level_orders")?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row.context("read level order row")?);
    }
    Ok(orders)
}

/// Count items (including removed) in the store.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_items(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM work_items", [], |row| row.get(0))
        .context("count work_items")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// All declared backlog levels, ordered by tier then level order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_levels(conn: &Connection) -> Result<Vec<BacklogLevel>> {
    let sql = "SELECT name, tier, level_order FROM backlog_levels \
               ORDER BY tier ASC, level_order ASC, name ASC";

    let mut stmt = conn.prepare(sql).context("prepare list_levels")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BacklogLevel {
                name: row.get(0)?,
                tier: parse_column(row, 1)?,
                level_order: row.get(2)?,
            })
        })
        .context("execute list_levels")?;

    let mut levels = Vec::new();
    for row in rows {
        levels.push(row.context("read level row")?);
    }
    Ok(levels)
}

/// Look up a level's row id by case-insensitive name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_level_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let result = conn.query_row(
        "SELECT level_id FROM backlog_levels WHERE lower(name) = lower(?1)",
        params![name.trim()],
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context(format!("find_level_id for '{name}'")),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a text column and parse it through `FromStr`.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkItemState> {
    Ok(WorkItemState {
        id: row.get(0)?,
        key: row.get(1)?,
        title: row.get(2)?,
        tier: parse_column(row, 3)?,
        level_order: row.get(4)?,
        level_name: row.get(5)?,
        parent_id: row.get(6)?,
        status: row.get(7)?,
        status_category: parse_column(row, 8)?,
        team: row.get(9)?,
    })
}

// ---------------------------------------------------------------------------
// Graceful recovery
// ---------------------------------------------------------------------------

/// Attempt to open the store, returning `Ok(None)` when it is missing or
/// unreadable so callers can suggest `moda init`.
///
/// # Errors
///
/// Returns an error only for unexpected failures (not missing/corrupt DB).
pub fn try_open_store(path: &std::path::Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    match super::open_store(path) {
        Ok(conn) => Ok(Some(conn)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to open store database"
            );
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
