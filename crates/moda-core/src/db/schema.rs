//! Canonical SQLite schema for the moda store.
//!
//! - `backlog_levels` declares the hierarchy (tier + level order per level)
//! - `work_items` keeps the latest state snapshot of every item; `parent_id`
//!   is deliberately not a foreign key so imports may arrive child-first
//! - `health_checks` holds time-boxed status reports keyed by object and
//!   report time
//! - `store_meta` tracks schema version and import bookkeeping

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS backlog_levels (
    level_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    tier TEXT NOT NULL CHECK (tier IN ('portfolio', 'requirement', 'task', 'other')),
    level_order INTEGER NOT NULL,
    UNIQUE (tier, level_order)
);

CREATE TABLE IF NOT EXISTS work_items (
    item_id TEXT PRIMARY KEY CHECK (length(trim(item_id)) > 0),
    item_key TEXT NOT NULL,
    title TEXT NOT NULL,
    level_id INTEGER NOT NULL REFERENCES backlog_levels(level_id),
    parent_id TEXT,
    status TEXT NOT NULL,
    status_category TEXT NOT NULL
        CHECK (status_category IN ('proposed', 'active', 'done', 'removed')),
    team_code TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> item_id)
);

CREATE TABLE IF NOT EXISTS health_checks (
    object_id TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('healthy', 'at-risk', 'unhealthy')),
    note TEXT,
    reported_by TEXT NOT NULL,
    reported_on_us INTEGER NOT NULL,
    expiration_us INTEGER NOT NULL,
    PRIMARY KEY (object_id, reported_on_us),
    CHECK (expiration_us > reported_on_us)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_import_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_import_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: read-path indexes for rollup fan-out and scoping.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_work_items_parent
    ON work_items(parent_id, status_category);

CREATE INDEX IF NOT EXISTS idx_work_items_level
    ON work_items(level_id, status_category);

CREATE INDEX IF NOT EXISTS idx_work_items_team
    ON work_items(team_code, status_category);

CREATE INDEX IF NOT EXISTS idx_health_checks_expiration
    ON health_checks(object_id, expiration_us DESC);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by rollup and health query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_work_items_parent",
    "idx_work_items_level",
    "idx_work_items_team",
    "idx_health_checks_expiration",
];
