//! [`WorkItemRepository`] backed by the `SQLite` store.

use anyhow::Result;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::fmt;

use super::WorkItemRepository;
use crate::db::query::{self, ItemFilter};
use crate::model::item::{Tier, WorkItemState};

/// Which items seed a rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RollupScope {
    /// Every rollup-tier item in the store.
    #[default]
    All,
    /// Items owned by one team.
    Team(String),
    /// Exactly these items.
    Items(Vec<String>),
}

impl RollupScope {
    /// Whether `item` falls inside this scope (tier and status not considered).
    #[must_use]
    pub fn admits(&self, item: &WorkItemState) -> bool {
        match self {
            Self::All => true,
            Self::Team(team) => item.team.as_deref() == Some(team.as_str()),
            Self::Items(ids) => ids.iter().any(|id| id == &item.id),
        }
    }

    fn apply(&self, filter: &mut ItemFilter) {
        match self {
            Self::All => {}
            Self::Team(team) => filter.team = Some(team.clone()),
            Self::Items(ids) => filter.ids.clone_from(ids),
        }
    }
}

impl fmt::Display for RollupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Team(team) => write!(f, "team:{team}"),
            Self::Items(ids) => write!(f, "items:{}", ids.join(",")),
        }
    }
}

impl WorkItemRepository for Connection {
    fn fetch_by_tiers(&self, tiers: &[Tier], scope: &RollupScope) -> Result<Vec<WorkItemState>> {
        if matches!(scope, RollupScope::Items(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }
        let mut filter = ItemFilter::tiers(tiers);
        scope.apply(&mut filter);
        query::list_items(self, &filter)
    }

    fn fetch_children(&self, parent_ids: &BTreeSet<String>) -> Result<Vec<WorkItemState>> {
        query::get_children_of(self, parent_ids, &Tier::ROLLUP)
    }

    fn portfolio_level_orders(&self) -> Result<Vec<i32>> {
        query::portfolio_level_orders(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::db::write::{self, WorkItemRecord};
    use crate::model::item::StatusCategory;
    use crate::model::level::{BacklogLevel, default_levels};
    use crate::rollup::{flatten_rollup, rollup_scope, summarize};

    fn test_db() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        write::seed_levels(&conn, &default_levels()).expect("seed levels");
        conn
    }

    fn insert(
        conn: &Connection,
        id: &str,
        level: &str,
        category: StatusCategory,
        parent: Option<&str>,
        team: Option<&str>,
    ) {
        let record = WorkItemRecord {
            id: id.to_string(),
            key: None,
            title: format!("Title for {id}"),
            level: level.to_string(),
            parent_id: parent.map(str::to_string),
            status: None,
            status_category: category,
            team: team.map(str::to_string),
        };
        write::upsert_item(conn, &record, 1_000).expect("insert item");
    }

    fn ids(items: &[WorkItemState]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    /// Epic -> Feature -> Story hierarchy used across tests.
    fn seed_hierarchy(conn: &Connection) {
        insert(conn, "e1", "Epic", StatusCategory::Active, None, Some("core"));
        insert(conn, "f1", "Feature", StatusCategory::Active, Some("e1"), Some("core"));
        insert(conn, "f2", "Feature", StatusCategory::Removed, Some("e1"), Some("core"));
        insert(conn, "s1", "Story", StatusCategory::Done, Some("f1"), Some("core"));
        insert(conn, "s2", "Story", StatusCategory::Active, Some("f1"), Some("web"));
        insert(conn, "s3", "Story", StatusCategory::Proposed, Some("f2"), Some("core"));
        insert(conn, "s4", "Story", StatusCategory::Done, Some("e1"), Some("core"));
        insert(conn, "t1", "Task", StatusCategory::Active, Some("s1"), Some("core"));
    }

    #[test]
    fn sqlite_rollup_walks_epic_feature_story() {
        let conn = test_db();
        seed_hierarchy(&conn);

        let epic = query::get_item(&conn, "e1", false).unwrap().unwrap();
        let result = flatten_rollup(&conn, vec![epic]).unwrap();
        assert_eq!(ids(&result), vec!["s4", "s1", "s2"]);

        let summary = summarize(&result);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.done, 2);
    }

    #[test]
    fn team_scope_seeds_from_team_items_only() {
        let conn = test_db();
        seed_hierarchy(&conn);

        let result = rollup_scope(&conn, &RollupScope::Team("web".to_string())).unwrap();
        assert_eq!(ids(&result), vec!["s2"]);

        // Descendants come along regardless of their own team.
        let core = rollup_scope(&conn, &RollupScope::Team("core".to_string())).unwrap();
        let mut got = ids(&core);
        got.sort_unstable();
        assert_eq!(got, vec!["s1", "s2", "s4"]);
    }

    #[test]
    fn items_scope_seeds_from_listed_ids() {
        let conn = test_db();
        seed_hierarchy(&conn);

        let result = rollup_scope(&conn, &RollupScope::Items(vec!["f1".to_string()])).unwrap();
        assert_eq!(ids(&result), vec!["s1", "s2"]);

        assert!(rollup_scope(&conn, &RollupScope::Items(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn custom_levels_with_gaps_roll_up() {
        let conn = test_db();
        write::upsert_level(&conn, &BacklogLevel::new("Theme", Tier::Portfolio, 5)).unwrap();
        insert(&conn, "e1", "Epic", StatusCategory::Active, None, None);
        insert(&conn, "th1", "Theme", StatusCategory::Active, Some("e1"), None);
        insert(&conn, "s1", "Story", StatusCategory::Active, Some("th1"), None);

        let epic = query::get_item(&conn, "e1", false).unwrap().unwrap();
        assert_eq!(ids(&flatten_rollup(&conn, vec![epic]).unwrap()), vec!["s1"]);
    }

    #[test]
    fn scope_display_and_admits() {
        let story = crate::rollup::testing::story("s1", None);
        assert!(RollupScope::All.admits(&story));
        assert!(!RollupScope::Team("core".to_string()).admits(&story));
        assert!(RollupScope::Items(vec!["s1".to_string()]).admits(&story));
        assert_eq!(RollupScope::Team("core".to_string()).to_string(), "team:core");
        assert_eq!(
            RollupScope::Items(vec!["a".to_string(), "b".to_string()]).to_string(),
            "items:a,b"
        );
    }
}
