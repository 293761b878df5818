#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use moda_core::config;
use output::OutputMode;
use std::env;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "moda: portfolio work-item progress rollups",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create the store and seed backlog levels",
        long_about = "Create .moda/, the SQLite store and a default config, then seed backlog levels from config. Safe to rerun after editing [[levels]].",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    moda init\n\n    # Reset config.toml to the default template\n    moda init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Import work items from JSON Lines",
        long_about = "Upsert work items from a JSONL file or stdin, one item per line.",
        after_help = "EXAMPLES:\n    # Import from a file\n    moda import --input items.jsonl\n\n    # Pipe from another tool\n    export-tool | moda import --json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Read",
        about = "List backlog levels",
        after_help = "EXAMPLES:\n    moda levels\n    moda levels --json"
    )]
    Levels(cmd::levels::LevelsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Roll up progress for a scope",
        long_about = "Flatten Portfolio items in scope into the Requirement-tier work beneath them and summarize it.",
        after_help = "EXAMPLES:\n    # Everything in the store\n    moda rollup\n\n    # One team's portfolio\n    moda rollup --team core\n\n    # Specific epics, summary only\n    moda rollup --root e1 --root e2 --summary-only --json"
    )]
    Rollup(cmd::rollup::RollupArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show progress for one item",
        after_help = "EXAMPLES:\n    moda progress e1\n    moda progress e1 --json"
    )]
    Progress(cmd::progress::ProgressArgs),

    #[command(next_help_heading = "Health", about = "Record and inspect health checks")]
    Health {
        #[command(subcommand)]
        command: cmd::health::HealthCommand,
    },

    #[command(
        next_help_heading = "Integrations",
        about = "Compute an integration cache key",
        after_help = "EXAMPLES:\n    moda cache-key azdo work-items --param project=Payments --list ids=42,7"
    )]
    CacheKey(cmd::cache_key::CacheKeyArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("MODA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "moda=debug,moda_core=debug,info"
        } else {
            "moda=info,moda_core=info,warn"
        })
    });

    let format = env::var("MODA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir()?;
    let user = config::load_user_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable user config");
        config::UserConfig::default()
    });
    let output = output::resolve_output_mode(cli.format, cli.json, user.output.as_deref());
    debug!(?output, root = %project_root.display(), "resolved output mode");

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Import(args) => cmd::import::run_import(args, output, &project_root),
        Commands::Levels(args) => cmd::levels::run_levels(args, output, &project_root),
        Commands::Rollup(args) => {
            let project = load_project(output, &project_root)?;
            cmd::rollup::run_rollup(args, &project, output, &project_root)
        }
        Commands::Progress(args) => cmd::progress::run_progress(args, output, &project_root),
        Commands::Health { command } => {
            let project = load_project(output, &project_root)?;
            cmd::health::run_health(command, &project, output, &project_root)
        }
        Commands::CacheKey(args) => cmd::cache_key::run_cache_key(args, output),
    }
}

fn load_project(output: OutputMode, project_root: &std::path::Path) -> anyhow::Result<config::ProjectConfig> {
    match config::load_project_config(project_root) {
        Ok(project) => Ok(project),
        Err(e) => {
            info!(error = %e, "project config rejected");
            output::fail(
                output,
                &output::CliError::coded(moda_core::error::ErrorCode::ConfigParseError, format!("{e:#}")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["moda", "levels", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_parses() {
        let cli = Cli::parse_from(["moda", "--format", "text", "levels"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn rollup_team_and_root_conflict() {
        assert!(Cli::try_parse_from(["moda", "rollup", "--team", "core", "--root", "e1"]).is_err());
        let cli = Cli::parse_from(["moda", "rollup", "--root", "e1", "--root", "e2"]);
        match cli.command {
            Commands::Rollup(args) => assert_eq!(args.root, vec!["e1", "e2"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn health_status_is_validated() {
        assert!(Cli::try_parse_from(["moda", "health", "add", "e1", "--status", "green"]).is_err());
        let cli = Cli::parse_from(["moda", "health", "add", "e1", "--status", "at-risk", "--days", "7"]);
        assert!(matches!(
            cli.command,
            Commands::Health {
                command: cmd::health::HealthCommand::Add(_)
            }
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["moda", "init"],
            vec!["moda", "import", "--input", "items.jsonl"],
            vec!["moda", "levels"],
            vec!["moda", "rollup"],
            vec!["moda", "progress", "e1"],
            vec!["moda", "health", "add", "e1", "--status", "healthy"],
            vec!["moda", "health", "show", "e1"],
            vec!["moda", "cache-key", "azdo", "items", "--param", "a=b"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "Failed to parse: {args:?} ({:?})", result.err());
        }
    }
}
