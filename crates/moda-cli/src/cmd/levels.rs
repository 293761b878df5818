//! `moda levels`: the backlog hierarchy declared in the store.

use clap::Args;
use moda_core::db::query;
use moda_core::model::level::BacklogLevel;
use std::io::Write;
use std::path::Path;

use super::open_store_or_fail;
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct LevelsArgs {}

/// Execute `moda levels`.
///
/// # Errors
///
/// Returns an error if the store is missing or the query fails.
pub fn run_levels(_args: &LevelsArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = open_store_or_fail(project_root, output)?;
    let levels = query::list_levels(&conn)?;

    render_mode(
        output,
        &levels,
        |levels, w| {
            for level in levels {
                writeln!(w, "{}\t{}\t{}", level.tier, level.level_order, level.name)?;
            }
            Ok(())
        },
        |levels, w| render_levels_pretty(levels, w),
    )
}

fn render_levels_pretty(levels: &[BacklogLevel], w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Backlog levels")?;
    if levels.is_empty() {
        return writeln!(w, "(none declared; run `moda init`)");
    }
    writeln!(w, "{:<12} {:>5}  NAME", "TIER", "ORDER")?;
    for level in levels {
        writeln!(w, "{:<12} {:>5}  {}", level.tier.as_str(), level.level_order, level.name)?;
    }
    Ok(())
}
