//! `moda rollup`: flatten Portfolio hierarchies into the work that feeds
//! their progress.

use anyhow::Result;
use clap::Args;
use moda_core::config::ProjectConfig;
use moda_core::db::query;
use moda_core::error::ErrorCode;
use moda_core::model::item::Tier;
use moda_core::rollup::{RollupScope, rollup_scope, summarize};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::{ItemRow, SummaryOutput, open_store_or_fail, write_item_line, write_item_row};
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, progress_bar, render_mode};

#[derive(Args, Debug)]
pub struct RollupArgs {
    /// Seed the rollup from one team's items.
    #[arg(long, conflicts_with = "root")]
    pub team: Option<String>,

    /// Seed the rollup from specific items (repeatable).
    #[arg(long = "root", value_name = "ID")]
    pub root: Vec<String>,

    /// Print only the summary line.
    #[arg(long)]
    pub summary_only: bool,
}

#[derive(Debug, Serialize)]
struct RollupReport {
    scope: String,
    summary: SummaryOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<ItemRow>>,
}

/// Execute `moda rollup`.
///
/// # Errors
///
/// Returns an error if the store is missing, a `--root` id does not exist or
/// sits below the Requirement tier, or the rollup fails.
pub fn run_rollup(
    args: &RollupArgs,
    project: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let conn = open_store_or_fail(project_root, output)?;
    let scope = scope_for(args, project);

    if let Some(rejected) = first_rejected_root(&conn, &scope)? {
        let error = match rejected {
            RootRejection::Missing(id) => {
                CliError::coded(ErrorCode::ItemNotFound, format!("item not found: '{id}'"))
            }
            RootRejection::NotRollup(id, tier) => CliError::coded(
                ErrorCode::NotRollupItem,
                format!("item '{id}' is {tier} tier and cannot seed a rollup"),
            ),
        };
        return fail(output, &error);
    }

    let items = rollup_scope(&conn, &scope)?;
    let summary = summarize(&items);
    tracing::info!(scope = %scope, items = items.len(), %summary, "rollup complete");

    let report = RollupReport {
        scope: scope.to_string(),
        summary: summary.into(),
        items: (!args.summary_only).then(|| items.iter().map(ItemRow::from).collect()),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for row in r.items.iter().flatten() {
                write_item_row(w, row)?;
            }
            writeln!(
                w,
                "# {} done/total={}/{} percent={:.1}",
                r.scope, r.summary.done, r.summary.total, r.summary.percent_complete
            )
        },
        |r, w| render_rollup_pretty(r, &summary, w),
    )
}

fn scope_for(args: &RollupArgs, project: &ProjectConfig) -> RollupScope {
    if !args.root.is_empty() {
        return RollupScope::Items(args.root.clone());
    }
    match args.team.as_ref().or(project.rollup.default_team.as_ref()) {
        Some(team) => RollupScope::Team(team.clone()),
        None => RollupScope::All,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RootRejection {
    Missing(String),
    NotRollup(String, Tier),
}

fn first_rejected_root(conn: &Connection, scope: &RollupScope) -> Result<Option<RootRejection>> {
    let RollupScope::Items(ids) = scope else {
        return Ok(None);
    };
    for id in ids {
        match query::get_item(conn, id, false)? {
            None => return Ok(Some(RootRejection::Missing(id.clone()))),
            Some(item) if !Tier::ROLLUP.contains(&item.tier) => {
                return Ok(Some(RootRejection::NotRollup(id.clone(), item.tier)));
            }
            Some(_) => {}
        }
    }
    Ok(None)
}

fn render_rollup_pretty(
    report: &RollupReport,
    summary: &moda_core::rollup::ProgressSummary,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    pretty_section(w, &format!("Rollup ({})", report.scope))?;
    pretty_kv(
        w,
        "Progress",
        format!("{summary} {}", progress_bar(summary)),
    )?;
    pretty_kv(
        w,
        "Breakdown",
        format!(
            "{} proposed, {} active, {} done",
            summary.proposed, summary.active, summary.done
        ),
    )?;

    if let Some(items) = &report.items {
        writeln!(w)?;
        if items.is_empty() {
            writeln!(w, "  (no items in scope)")?;
        }
        for row in items {
            write_item_line(w, row)?;
        }
    }
    Ok(())
}
