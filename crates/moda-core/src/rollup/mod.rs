//! Hierarchical work-item progress rollup.
//!
//! Portfolio-tier items (epics, features, ...) are containers: their progress
//! is the progress of the requirement-level work beneath them. A rollup
//! flattens that hierarchy into the list of non-Portfolio items that feed a
//! progress summary.
//!
//! # Walk
//!
//! The walk is level-synchronous. Portfolio ids are grouped by level order
//! into a [`RollupFrontier`]; queued levels are visited in ascending order
//! from the lowest (the root), jumping straight to the next level that holds
//! ids, and every id waiting at a level is resolved with a single batched
//! [`WorkItemRepository::fetch_children`] call. Repository
//! round-trips are therefore bounded by the number of distinct Portfolio
//! levels, not by the number of items.
//!
//! - Non-Portfolio items are emitted once each, in first-seen order.
//! - A Portfolio child only joins the frontier when its level order is
//!   strictly greater than its parent's; anything else is skipped silently.
//! - Items in the removed status category are ignored everywhere, including
//!   the caller's initial set.
//! - Gaps between level orders are tolerated.

#![allow(clippy::module_name_repetitions)]

pub mod progress;
pub mod repository;
pub mod summary;

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::model::item::{Tier, WorkItemState};

pub use progress::{ItemProgress, ProgressError, compute_item_progress};
pub use repository::RollupScope;
pub use summary::{ProgressSummary, summarize};

/// Read access the rollup needs from the work-item store.
///
/// Implementations must leave out items in the removed status category.
pub trait WorkItemRepository {
    /// All items whose tier is in `tiers`, restricted by `scope`.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    fn fetch_by_tiers(&self, tiers: &[Tier], scope: &RollupScope) -> Result<Vec<WorkItemState>>;

    /// All Portfolio- and Requirement-tier items whose parent is in
    /// `parent_ids`, in one batched lookup.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    fn fetch_children(&self, parent_ids: &BTreeSet<String>) -> Result<Vec<WorkItemState>>;

    /// Distinct level orders of Portfolio-tier items across the whole store.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    fn portfolio_level_orders(&self) -> Result<Vec<i32>>;
}

/// Portfolio ids awaiting child resolution, keyed by level order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupFrontier {
    levels: BTreeMap<i32, BTreeSet<String>>,
}

impl RollupFrontier {
    /// Queue `id` at `level_order`. Returns `false` if it was already queued.
    pub fn insert(&mut self, level_order: i32, id: String) -> bool {
        self.levels.entry(level_order).or_default().insert(id)
    }

    /// Remove and return the ids queued at `level_order`.
    pub fn take(&mut self, level_order: i32) -> Option<BTreeSet<String>> {
        self.levels.remove(&level_order)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Lowest queued level order.
    #[must_use]
    pub fn lowest(&self) -> Option<i32> {
        self.levels.keys().next().copied()
    }

    /// Remove and return the lowest queued level at or above `floor`.
    pub fn pop_next(&mut self, floor: i32) -> Option<(i32, BTreeSet<String>)> {
        let level = *self.levels.range(floor..).next()?.0;
        self.levels.remove_entry(&level)
    }
}

/// Flatten `initial` into the non-Portfolio items reachable through it.
///
/// `initial` is the caller's already-scoped set (see
/// [`WorkItemRepository::fetch_by_tiers`]). When it holds no Portfolio items
/// it is returned as-is (minus removed items and duplicates) without touching
/// the repository.
///
/// # Errors
///
/// Repository failures propagate unchanged; the walk itself never fails.
pub fn flatten_rollup<R>(repo: &R, initial: Vec<WorkItemState>) -> Result<Vec<WorkItemState>>
where
    R: WorkItemRepository + ?Sized,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut result: Vec<WorkItemState> = Vec::new();
    let mut frontier = RollupFrontier::default();

    for item in initial {
        if item.is_removed() {
            continue;
        }
        if item.is_portfolio() {
            frontier.insert(item.level_order, item.id);
        } else if seen.insert(item.id.clone()) {
            result.push(item);
        }
    }

    let Some(frontier_min) = frontier.lowest() else {
        return Ok(result);
    };

    let orders = repo.portfolio_level_orders()?;
    let mut floor = orders.iter().copied().min().map_or(frontier_min, |m| m.min(frontier_min));

    while let Some((level, parent_ids)) = frontier.pop_next(floor) {
        let children = repo.fetch_children(&parent_ids)?;
        debug!(
            level,
            parents = parent_ids.len(),
            children = children.len(),
            "expanded rollup level"
        );

        for child in children {
            if child.is_removed() {
                continue;
            }
            if child.is_portfolio() {
                if child.level_order > level {
                    frontier.insert(child.level_order, child.id);
                } else {
                    debug!(
                        id = %child.id,
                        parent_level = level,
                        child_level = child.level_order,
                        "skipping portfolio child that does not sit below its parent"
                    );
                }
            } else if seen.insert(child.id.clone()) {
                result.push(child);
            }
        }

        floor = level.saturating_add(1);
    }

    Ok(result)
}

/// Fetch the rollup-tier items in `scope` and flatten them.
///
/// Task and Other tier items never seed a rollup.
///
/// # Errors
///
/// Repository failures propagate unchanged.
pub fn rollup_scope<R>(repo: &R, scope: &RollupScope) -> Result<Vec<WorkItemState>>
where
    R: WorkItemRepository + ?Sized,
{
    let initial = repo.fetch_by_tiers(&Tier::ROLLUP, scope)?;
    debug!(initial = initial.len(), scope = %scope, "starting rollup");
    flatten_rollup(repo, initial)
}
