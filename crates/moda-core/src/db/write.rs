//! Write paths for the store: level seeding and work-item upserts.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::model::{item::StatusCategory, level::BacklogLevel};

use super::query;

/// One work item as it arrives from an import feed.
///
/// `level` names a declared backlog level; `key` defaults to the id and
/// `status` defaults to a title-cased status category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    pub title: String,
    pub level: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub status_category: StatusCategory,
    #[serde(default)]
    pub team: Option<String>,
}

/// Insert or update a backlog level by name.
///
/// # Errors
///
/// Returns an error if the write fails (e.g. a second level claims the same
/// tier and order).
pub fn upsert_level(conn: &Connection, level: &BacklogLevel) -> Result<()> {
    conn.execute(
        "INSERT INTO backlog_levels (name, tier, level_order) VALUES (?1, ?2, ?3) \
         ON CONFLICT(name) DO UPDATE SET tier = excluded.tier, level_order = excluded.level_order",
        params![level.name.trim(), level.tier.as_str(), level.level_order],
    )
    .with_context(|| format!("upsert backlog level '{}'", level.name))?;
    Ok(())
}

/// Upsert every level in `levels`.
///
/// # Errors
///
/// Returns an error on the first failing write.
pub fn seed_levels(conn: &Connection, levels: &[BacklogLevel]) -> Result<usize> {
    for level in levels {
        upsert_level(conn, level)?;
    }
    tracing::debug!(count = levels.len(), "seeded backlog levels");
    Ok(levels.len())
}

/// Insert or update a work item. `now_us` stamps `updated_at_us` (and
/// `created_at_us` for new rows).
///
/// # Errors
///
/// Returns an error if the id or title is blank, the level is not declared,
/// or the write fails.
pub fn upsert_item(conn: &Connection, record: &WorkItemRecord, now_us: i64) -> Result<()> {
    let id = record.id.trim();
    if id.is_empty() {
        bail!("work item id must not be empty");
    }
    if record.title.trim().is_empty() {
        bail!("work item '{id}' has an empty title");
    }

    let Some(level_id) = query::find_level_id(conn, &record.level)? else {
        bail!("work item '{id}' references unknown level '{}'", record.level);
    };

    let key = record
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(id);
    let status = record
        .status
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_status(record.status_category).to_string());
    let parent_id = record
        .parent_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    conn.execute(
        "INSERT INTO work_items \
         (item_id, item_key, title, level_id, parent_id, status, status_category, \
          team_code, created_at_us, updated_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
         ON CONFLICT(item_id) DO UPDATE SET \
           item_key = excluded.item_key, \
           title = excluded.title, \
           level_id = excluded.level_id, \
           parent_id = excluded.parent_id, \
           status = excluded.status, \
           status_category = excluded.status_category, \
           team_code = excluded.team_code, \
           updated_at_us = excluded.updated_at_us",
        params![
            id,
            key,
            record.title.trim(),
            level_id,
            parent_id,
            status,
            record.status_category.as_str(),
            record.team,
            now_us
        ],
    )
    .with_context(|| format!("upsert work item '{id}'"))?;

    Ok(())
}

/// Record the time of the latest successful import.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn mark_imported(conn: &Connection, now_us: i64) -> Result<()> {
    conn.execute(
        "UPDATE store_meta SET last_import_at_us = ?1 WHERE id = 1",
        params![now_us],
    )
    .context("update store_meta import cursor")?;
    Ok(())
}

const fn default_status(category: StatusCategory) -> &'static str {
    match category {
        StatusCategory::Proposed => "Proposed",
        StatusCategory::Active => "Active",
        StatusCategory::Done => "Done",
        StatusCategory::Removed => "Removed",
    }
}
