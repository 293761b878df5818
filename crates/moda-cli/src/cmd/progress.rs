//! `moda progress <id>`: completion status of one work item.
//!
//! A Portfolio item reports on the Requirement-tier items beneath it at any
//! depth. Other items report on themselves.

use std::io::Write;
use std::path::Path;

use clap::Args;
use moda_core::error::ErrorCode;
use moda_core::rollup::{ProgressError, ProgressSummary, compute_item_progress};
use serde::Serialize;

use super::{ItemRow, SummaryOutput, open_store_or_fail, write_item_line, write_item_row};
use crate::output::{CliError, OutputMode, fail, progress_bar, render_mode};

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Work item id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ProgressOutput {
    item: ItemRow,
    tier: String,
    summary: SummaryOutput,
    leaves: Vec<ItemRow>,
}

/// Execute `moda progress`.
///
/// # Errors
///
/// Returns an error if the store is missing, the item does not exist, or the
/// rollup fails.
pub fn run_progress(args: &ProgressArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = open_store_or_fail(project_root, output)?;

    let progress = match compute_item_progress(&conn, &args.id) {
        Ok(progress) => progress,
        Err(err @ ProgressError::ItemNotFound(_)) => {
            return fail(output, &CliError::coded(ErrorCode::ItemNotFound, err.to_string()));
        }
        Err(ProgressError::Db(e)) => return Err(e),
    };

    let report = ProgressOutput {
        item: ItemRow::from(&progress.item),
        tier: progress.item.tier.to_string(),
        summary: progress.summary.into(),
        leaves: progress.leaves.iter().map(ItemRow::from).collect(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}/{}\t{:.1}",
                r.item.id, r.item.key, r.summary.done, r.summary.total, r.summary.percent_complete
            )?;
            for leaf in &r.leaves {
                write_item_row(w, leaf)?;
            }
            Ok(())
        },
        |r, w| render_progress_human(r, &progress.summary, w),
    )
}

fn render_progress_human(
    report: &ProgressOutput,
    summary: &ProgressSummary,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        w,
        "{} {} [{}, {}]",
        report.item.key, report.item.title, report.item.level, report.item.status
    )?;

    if summary.total == 0 {
        writeln!(w, "  (no work beneath this item)")?;
        return Ok(());
    }

    writeln!(w, "  Progress: {summary} {}", progress_bar(summary))?;
    for leaf in &report.leaves {
        write_item_line(w, leaf)?;
    }
    Ok(())
}
