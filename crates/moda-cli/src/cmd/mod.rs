pub mod cache_key;
pub mod health;
pub mod import;
pub mod init;
pub mod levels;
pub mod progress;
pub mod rollup;

use std::io::{self, Write};
use std::path::Path;

use moda_core::db::{self, query};
use moda_core::error::ErrorCode;
use moda_core::model::item::WorkItemState;
use moda_core::rollup::ProgressSummary;
use rusqlite::Connection;
use serde::Serialize;

use crate::output::{CliError, OutputMode, fail};

/// Open the project store, or report that `moda init` has not been run.
pub fn open_store_or_fail(project_root: &Path, output: OutputMode) -> anyhow::Result<Connection> {
    let path = db::store_path(project_root);
    match query::try_open_store(&path)? {
        Some(conn) => Ok(conn),
        None => fail(
            output,
            &CliError::coded(
                ErrorCode::NotInitialized,
                format!("store not found at {}", path.display()),
            ),
        ),
    }
}

/// [`ProgressSummary`] with its derived percentage, for JSON output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryOutput {
    pub total: u32,
    pub proposed: u32,
    pub active: u32,
    pub done: u32,
    pub percent_complete: f64,
}

impl From<ProgressSummary> for SummaryOutput {
    fn from(summary: ProgressSummary) -> Self {
        Self {
            total: summary.total,
            proposed: summary.proposed,
            active: summary.active,
            done: summary.done,
            percent_complete: (summary.percent_complete() * 10.0).round() / 10.0,
        }
    }
}

/// One rolled-up item as commands print it.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRow {
    pub id: String,
    pub key: String,
    pub title: String,
    pub level: String,
    pub status: String,
    pub status_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl From<&WorkItemState> for ItemRow {
    fn from(item: &WorkItemState) -> Self {
        Self {
            id: item.id.clone(),
            key: item.key.clone(),
            title: item.title.clone(),
            level: item.level_name.clone(),
            status: item.status.clone(),
            status_category: item.status_category.to_string(),
            team: item.team.clone(),
        }
    }
}

/// Tab-separated row used by text output.
pub fn write_item_row(w: &mut dyn Write, row: &ItemRow) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        row.id, row.key, row.level, row.status_category, row.title
    )
}

/// Indented line used by pretty output.
pub fn write_item_line(w: &mut dyn Write, row: &ItemRow) -> io::Result<()> {
    let marker = match row.status_category.as_str() {
        "done" => "done  ",
        "active" => "active",
        _ => "new   ",
    };
    writeln!(w, "  {marker} {:<12} {}", row.key, row.title)
}
