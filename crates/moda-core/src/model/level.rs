//! Backlog level definitions: the declared shape of the work-item hierarchy.

use serde::{Deserialize, Serialize};

use super::item::Tier;

/// One level of the backlog hierarchy (e.g. "Epic", "Feature", "Story").
///
/// `level_order` ranks levels within and across tiers; lower values sit
/// closer to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogLevel {
    pub name: String,
    pub tier: Tier,
    pub level_order: i32,
}

impl BacklogLevel {
    #[must_use]
    pub fn new(name: impl Into<String>, tier: Tier, level_order: i32) -> Self {
        Self {
            name: name.into(),
            tier,
            level_order,
        }
    }
}

/// The hierarchy every new project starts with.
#[must_use]
pub fn default_levels() -> Vec<BacklogLevel> {
    vec![
        BacklogLevel::new("Epic", Tier::Portfolio, 1),
        BacklogLevel::new("Feature", Tier::Portfolio, 2),
        BacklogLevel::new("Story", Tier::Requirement, 1),
        BacklogLevel::new("Task", Tier::Task, 1),
        BacklogLevel::new("Other", Tier::Other, 1),
    ]
}
