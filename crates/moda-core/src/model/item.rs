use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Coarse position of a work item in the backlog hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Portfolio,
    Requirement,
    Task,
    Other,
}

impl Tier {
    /// Tiers that participate in progress rollups. Task and Other items
    /// never seed or expand one.
    pub const ROLLUP: [Self; 2] = [Self::Portfolio, Self::Requirement];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Portfolio => "portfolio",
            Self::Requirement => "requirement",
            Self::Task => "task",
            Self::Other => "other",
        }
    }
}

/// Workflow status category. Individual workflow statuses (e.g. "In Review")
/// map onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Proposed,
    Active,
    Done,
    Removed,
}

impl StatusCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Active => "active",
            Self::Done => "done",
            Self::Removed => "removed",
        }
    }

    /// Returns `true` for the category that is excluded from every rollup.
    #[must_use]
    pub const fn is_removed(self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Read-only progress snapshot of a single work item.
///
/// This is what rollups consume and return. It carries the hierarchy
/// coordinates (`tier`, `level_order`, `parent_id`) plus the state fields
/// that progress summaries aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemState {
    pub id: String,
    pub key: String,
    pub title: String,
    pub tier: Tier,
    pub level_order: i32,
    pub level_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub status: String,
    pub status_category: StatusCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl WorkItemState {
    #[must_use]
    pub fn is_portfolio(&self) -> bool {
        self.tier == Tier::Portfolio
    }

    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.status_category.is_removed()
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Tier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "portfolio" => Ok(Self::Portfolio),
            "requirement" => Ok(Self::Requirement),
            "task" => Ok(Self::Task),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                expected: "tier",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for StatusCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "proposed" => Ok(Self::Proposed),
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            "removed" => Ok(Self::Removed),
            _ => Err(ParseEnumError {
                expected: "status category",
                got: s.to_string(),
            }),
        }
    }
}
