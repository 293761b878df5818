//! SQLite store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers run alongside an importing writer
//! - `busy_timeout = 5s` to ride out transient lock contention
//! - `foreign_keys = ON` so items cannot reference undeclared levels

pub mod health;
pub mod migrations;
pub mod query;
pub mod schema;
pub mod write;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory (relative to the project root) holding all moda state.
pub const STORE_DIR: &str = ".moda";

/// Database file name inside [`STORE_DIR`].
pub const STORE_FILE: &str = "moda.db";

/// Path of the store database for a project rooted at `project_root`.
#[must_use]
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(STORE_DIR).join(STORE_FILE)
}

/// Open (or create) the store database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
