//! Progress of a single work item, rolled up through its descendants.

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;

use super::{ProgressSummary, flatten_rollup, summarize};
use crate::db::query;
use crate::model::item::WorkItemState;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// The item does not exist or is in the removed status category.
    #[error("item not found: '{0}'")]
    ItemNotFound(String),

    #[error("database error: {0:#}")]
    Db(#[from] anyhow::Error),
}

/// An item together with the leaves its progress is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemProgress {
    pub item: WorkItemState,
    pub leaves: Vec<WorkItemState>,
    pub summary: ProgressSummary,
}

/// Roll up `item_id` and summarize the result.
///
/// A Portfolio item reports on the Requirement-tier items beneath it. Any
/// other item rolls up to itself.
///
/// # Errors
///
/// Returns [`ProgressError::ItemNotFound`] if the item is missing or removed,
/// or [`ProgressError::Db`] for store failures.
pub fn compute_item_progress(conn: &Connection, item_id: &str) -> Result<ItemProgress, ProgressError> {
    let item = query::get_item(conn, item_id, false)?
        .ok_or_else(|| ProgressError::ItemNotFound(item_id.to_string()))?;

    let leaves = flatten_rollup(conn, vec![item.clone()])
        .with_context(|| format!("roll up '{item_id}'"))?;
    let summary = summarize(&leaves);

    tracing::debug!(item = item_id, leaves = leaves.len(), %summary, "computed item progress");
    Ok(ItemProgress {
        item,
        leaves,
        summary,
    })
}
