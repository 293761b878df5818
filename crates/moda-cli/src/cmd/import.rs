//! `moda import`: load work items from JSON Lines.
//!
//! One [`WorkItemRecord`] per line. Blank lines and `#` comments are ignored;
//! lines that are not valid records are skipped with a warning. Everything
//! else is applied in a single transaction, so a record naming an undeclared
//! level aborts the whole import.

use anyhow::{Context as _, Result};
use clap::Args;
use moda_core::db::{query, write, write::WorkItemRecord};
use moda_core::error::ErrorCode;
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::open_store_or_fail;
use crate::output::{CliError, OutputMode, fail, render};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSONL file to read; omit to read from stdin.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize)]
struct ImportSummary {
    input_path: Option<String>,
    total_lines: usize,
    imported: usize,
    skipped_invalid: usize,
    items_in_store: u64,
}

enum ImportError {
    UnknownLevel { line: usize, level: String },
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for ImportError {
    fn from(e: anyhow::Error) -> Self {
        Self::Failed(e)
    }
}

/// Execute `moda import`.
///
/// # Errors
///
/// Returns an error if the store is missing, the input cannot be read, or a
/// record cannot be applied.
pub fn run_import(args: &ImportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut conn = open_store_or_fail(project_root, output)?;

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open JSONL input {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let now_us = chrono::Utc::now().timestamp_micros();
    let mut summary = match import_records(&mut conn, reader, now_us) {
        Ok(summary) => summary,
        Err(ImportError::UnknownLevel { line, level }) => {
            return fail(
                output,
                &CliError::coded(
                    ErrorCode::UnknownLevel,
                    format!("line {line}: unknown backlog level '{level}'"),
                ),
            );
        }
        Err(ImportError::Failed(e)) => return Err(e),
    };
    summary.input_path = args.input.as_ref().map(|p| p.display().to_string());
    summary.items_in_store = query::count_items(&conn)?;

    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped_invalid,
        "import finished"
    );

    render(output, &summary, |s, w| {
        writeln!(w, "moda import {}", s.input_path.as_deref().unwrap_or("<stdin>"))?;
        writeln!(w, "  total lines:    {}", s.total_lines)?;
        writeln!(w, "  imported:       {}", s.imported)?;
        writeln!(w, "  skipped:        {}", s.skipped_invalid)?;
        writeln!(w, "  items in store: {}", s.items_in_store)
    })
}

fn import_records(
    conn: &mut Connection,
    reader: impl BufRead,
    now_us: i64,
) -> Result<ImportSummary, ImportError> {
    let tx = conn.transaction().context("begin import transaction")?;
    let mut summary = ImportSummary::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let raw = line.with_context(|| format!("failed to read line {line_no}"))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        summary.total_lines += 1;
        let record: WorkItemRecord = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(err) => {
                summary.skipped_invalid += 1;
                tracing::warn!(line = line_no, error = %err, "skipping invalid import record");
                continue;
            }
        };

        if query::find_level_id(&tx, &record.level)?.is_none() {
            return Err(ImportError::UnknownLevel {
                line: line_no,
                level: record.level,
            });
        }

        if let Err(err) = write::upsert_item(&tx, &record, now_us) {
            summary.skipped_invalid += 1;
            tracing::warn!(line = line_no, error = %err, "skipping rejected import record");
            continue;
        }
        summary.imported += 1;
    }

    write::mark_imported(&tx, now_us)?;
    tx.commit().context("commit import transaction")?;
    Ok(summary)
}
