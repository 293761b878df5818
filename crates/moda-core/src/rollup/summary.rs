use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::item::{StatusCategory, WorkItemState};

/// Counts of rolled-up items by status category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Non-removed items counted.
    pub total: u32,
    pub proposed: u32,
    pub active: u32,
    pub done: u32,
}

impl ProgressSummary {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            total: 0,
            proposed: 0,
            active: 0,
            done: 0,
        }
    }

    /// Percentage of items done, in `0.0..=100.0`.
    ///
    /// Returns `0.0` when there is nothing to count.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.done) / f64::from(self.total) * 100.0
    }

    /// `true` when at least one item is counted and all of them are done.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.done)
    }

    fn add(&mut self, category: StatusCategory) {
        match category {
            StatusCategory::Proposed => self.proposed += 1,
            StatusCategory::Active => self.active += 1,
            StatusCategory::Done => self.done += 1,
            StatusCategory::Removed => return,
        }
        self.total += 1;
    }
}

impl fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.done,
            self.total,
            self.percent_complete()
        )
    }
}

/// Fold a rollup result into a [`ProgressSummary`]. Removed items are skipped.
#[must_use]
pub fn summarize(items: &[WorkItemState]) -> ProgressSummary {
    let mut summary = ProgressSummary::zero();
    for item in items {
        summary.add(item.status_category);
    }
    summary
}
