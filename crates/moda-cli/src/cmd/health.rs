//! `moda health`: record and inspect health checks on work items.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use moda_core::config::ProjectConfig;
use moda_core::db::{health, query};
use moda_core::error::ErrorCode;
use moda_core::model::health::{HealthCheck, HealthCheckError, HealthStatus, TruncatedCheck};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::open_store_or_fail;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render, render_mode};

#[derive(Subcommand, Debug)]
pub enum HealthCommand {
    #[command(
        about = "Record a health check",
        after_help = "EXAMPLES:\n    # Flag an epic as at risk for the default window\n    moda health add e1 --status at-risk --note \"vendor slip\"\n\n    # Record a one-week check\n    moda health add e1 --status healthy --days 7"
    )]
    Add(HealthAddArgs),

    #[command(
        about = "Show the current health check and history",
        after_help = "EXAMPLES:\n    moda health show e1\n    moda health show e1 --json"
    )]
    Show(HealthShowArgs),
}

#[derive(Args, Debug)]
pub struct HealthAddArgs {
    /// Work item id.
    pub id: String,

    /// healthy, at-risk or unhealthy.
    #[arg(long)]
    pub status: HealthStatus,

    #[arg(long)]
    pub note: Option<String>,

    /// Days until the check expires, at most 36500 (default: health.default_expiration_days).
    #[arg(long)]
    pub days: Option<u32>,

    /// Reporter name (default: $USER).
    #[arg(long)]
    pub by: Option<String>,

    /// Report time as RFC 3339 (default: now).
    #[arg(long, value_name = "TIMESTAMP")]
    pub at: Option<String>,
}

#[derive(Args, Debug)]
pub struct HealthShowArgs {
    /// Work item id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct AddReport {
    check: HealthCheck,
    truncated: Vec<TruncatedOutput>,
}

#[derive(Debug, Serialize)]
struct TruncatedOutput {
    reported_on: DateTime<Utc>,
    previous_expiration: DateTime<Utc>,
    new_expiration: DateTime<Utc>,
}

impl From<&TruncatedCheck> for TruncatedOutput {
    fn from(t: &TruncatedCheck) -> Self {
        Self {
            reported_on: t.reported_on,
            previous_expiration: t.previous_expiration,
            new_expiration: t.new_expiration,
        }
    }
}

#[derive(Debug, Serialize)]
struct ShowReport {
    object_id: String,
    current: Option<HealthCheck>,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    #[serde(flatten)]
    check: HealthCheck,
    expired: bool,
}

/// Execute a `moda health` subcommand.
///
/// # Errors
///
/// Returns an error if the store is missing, the item does not exist, the
/// check is rejected, or a store operation fails.
pub fn run_health(
    command: &HealthCommand,
    project: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    match command {
        HealthCommand::Add(args) => run_add(args, project, output, project_root),
        HealthCommand::Show(args) => run_show(args, output, project_root),
    }
}

fn run_add(
    args: &HealthAddArgs,
    project: &ProjectConfig,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut conn = open_store_or_fail(project_root, output)?;
    if query::get_item(&conn, &args.id, false)?.is_none() {
        return fail(
            output,
            &CliError::coded(ErrorCode::ItemNotFound, format!("item not found: '{}'", args.id)),
        );
    }

    let reported_on = match &args.at {
        Some(raw) => parse_timestamp(raw)?,
        None => Utc::now(),
    };
    let days = args.days.unwrap_or(project.health.default_expiration_days);
    let reported_by = args
        .by
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "unknown".to_string());

    let check = match HealthCheck::with_lifetime(
        args.id.as_str(),
        args.status,
        reported_by,
        reported_on,
        Duration::days(i64::from(days)),
    ) {
        Ok(check) => check.with_note(args.note.clone().unwrap_or_default()),
        Err(err) => {
            return fail(output, &CliError::coded(ErrorCode::HealthCheckRejected, err.to_string()));
        }
    };

    let truncated = match health::record_check(&mut conn, &check) {
        Ok(truncated) => truncated,
        Err(err) => {
            if let Some(rejection) = err.downcast_ref::<HealthCheckError>() {
                return fail(
                    output,
                    &CliError::coded(ErrorCode::HealthCheckRejected, rejection.to_string()),
                );
            }
            return Err(err);
        }
    };

    tracing::info!(
        object_id = %check.object_id,
        status = %check.status,
        truncated = truncated.len(),
        "recorded health check"
    );

    let report = AddReport {
        check,
        truncated: truncated.iter().map(TruncatedOutput::from).collect(),
    };
    render(output, &report, |r, w| {
        writeln!(
            w,
            "✓ {} is {} until {}",
            r.check.object_id,
            r.check.status,
            r.check.expiration.to_rfc3339()
        )?;
        for t in &r.truncated {
            writeln!(
                w,
                "  ended check from {} at {}",
                t.reported_on.to_rfc3339(),
                t.new_expiration.to_rfc3339()
            )?;
        }
        Ok(())
    })
}

fn run_show(args: &HealthShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let conn = open_store_or_fail(project_root, output)?;
    if query::get_item(&conn, &args.id, true)?.is_none() {
        return fail(
            output,
            &CliError::coded(ErrorCode::ItemNotFound, format!("item not found: '{}'", args.id)),
        );
    }

    let now = Utc::now();
    let history = health::load_history(&conn, &args.id)?;
    let report = ShowReport {
        object_id: args.id.clone(),
        current: history.current(now).cloned(),
        history: history
            .checks()
            .iter()
            .rev()
            .map(|c| HistoryEntry {
                check: c.clone(),
                expired: c.is_expired(now),
            })
            .collect(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for entry in &r.history {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    entry.check.reported_on.to_rfc3339(),
                    entry.check.expiration.to_rfc3339(),
                    entry.check.status,
                    if entry.expired { "expired" } else { "current" },
                    entry.check.note.as_deref().unwrap_or("")
                )?;
            }
            Ok(())
        },
        |r, w| render_show_pretty(r, w),
    )
}

fn render_show_pretty(report: &ShowReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Health: {}", report.object_id))?;
    match &report.current {
        Some(check) => {
            pretty_kv(w, "Status", check.status.as_str())?;
            pretty_kv(w, "Reported", format!("{} by {}", check.reported_on.to_rfc3339(), check.reported_by))?;
            pretty_kv(w, "Expires", check.expiration.to_rfc3339())?;
            if let Some(note) = &check.note {
                pretty_kv(w, "Note", note)?;
            }
        }
        None => writeln!(w, "(no current health check)")?,
    }

    if !report.history.is_empty() {
        writeln!(w)?;
        writeln!(w, "History:")?;
        for entry in &report.history {
            writeln!(
                w,
                "  {}  {:<9}  {}",
                entry.check.reported_on.format("%Y-%m-%d %H:%M"),
                entry.check.status.as_str(),
                entry.check.note.as_deref().unwrap_or("")
            )?;
        }
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid --at timestamp '{raw}' (expected RFC 3339)"))
}
