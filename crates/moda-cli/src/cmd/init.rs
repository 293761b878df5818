use anyhow::{Context as _, Result};
use clap::Args;
use moda_core::config;
use moda_core::db::{self, STORE_DIR, write};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite `.moda/config.toml` with the default template.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[rollup]\n\
    # default_team = \"core\"\n\
    \n\
    [health]\n\
    default_expiration_days = 14\n\
    \n\
    [[levels]]\n\
    name = \"Epic\"\n\
    tier = \"portfolio\"\n\
    level_order = 1\n\
    \n\
    [[levels]]\n\
    name = \"Feature\"\n\
    tier = \"portfolio\"\n\
    level_order = 2\n\
    \n\
    [[levels]]\n\
    name = \"Story\"\n\
    tier = \"requirement\"\n\
    level_order = 1\n\
    \n\
    [[levels]]\n\
    name = \"Task\"\n\
    tier = \"task\"\n\
    level_order = 1\n\
    \n\
    [[levels]]\n\
    name = \"Other\"\n\
    tier = \"other\"\n\
    level_order = 1\n";

const GITIGNORE: &str = "moda.db\nmoda.db-wal\nmoda.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    store: String,
    config: String,
    config_written: bool,
    levels_seeded: usize,
}

/// Execute `moda init`. Safe to rerun: the store is migrated in place and
/// backlog levels are re-seeded from config.
///
/// ```text
/// .moda/
///   config.toml   (written when absent, or with --force)
///   moda.db       (SQLite store)
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if any filesystem or store operation fails, or the
/// config is invalid.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let report = init_store(args, project_root)?;
    tracing::info!(levels = report.levels_seeded, "initialized moda store");

    render(output, &report, |r, w| {
        writeln!(w, "✓ Initialized {STORE_DIR}/")?;
        pretty_kv(w, "Store", &r.store)?;
        pretty_kv(
            w,
            "Config",
            if r.config_written {
                format!("{} (written)", r.config)
            } else {
                r.config.clone()
            },
        )?;
        pretty_kv(w, "Levels", r.levels_seeded.to_string())?;
        writeln!(w)?;
        writeln!(w, "Next: moda import --input items.jsonl")
    })
}

fn init_store(args: &InitArgs, project_root: &Path) -> Result<InitReport> {
    let moda_dir = project_root.join(STORE_DIR);
    std::fs::create_dir_all(&moda_dir)
        .with_context(|| format!("Failed to create {}", moda_dir.display()))?;

    let config_path = moda_dir.join("config.toml");
    let config_written = args.force || !config_path.exists();
    if config_written {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }

    let gitignore_path = moda_dir.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, GITIGNORE)
            .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;
    }

    let project = config::load_project_config(project_root)?;
    let store_path = db::store_path(project_root);
    let conn = db::open_store(&store_path)?;
    let levels_seeded = write::seed_levels(&conn, &project.levels)?;

    Ok(InitReport {
        store: store_path.display().to_string(),
        config: config_path.display().to_string(),
        config_written,
        levels_seeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moda_core::db::query;
    use moda_core::model::level::default_levels;

    #[test]
    fn template_matches_default_config() {
        let parsed: config::ProjectConfig = toml::from_str(CONFIG_TOML).unwrap();
        assert_eq!(parsed.levels, default_levels());
        assert_eq!(parsed.health.default_expiration_days, 14);
        assert!(parsed.rollup.default_team.is_none());
    }

    #[test]
    fn fresh_init_creates_store_and_levels() {
        let root = tempfile::tempdir().unwrap();
        let report = init_store(&InitArgs { force: false }, root.path()).unwrap();
        assert!(report.config_written);
        assert_eq!(report.levels_seeded, 5);

        assert!(root.path().join(".moda/config.toml").is_file());
        assert!(root.path().join(".moda/.gitignore").is_file());
        let conn = db::open_store(&db::store_path(root.path())).unwrap();
        assert_eq!(query::list_levels(&conn).unwrap().len(), 5);
    }

    #[test]
    fn rerun_keeps_edited_config_unless_forced() {
        let root = tempfile::tempdir().unwrap();
        init_store(&InitArgs { force: false }, root.path()).unwrap();

        let config_path = root.path().join(".moda/config.toml");
        let edited = format!("{CONFIG_TOML}\n[[levels]]\nname = \"Initiative\"\ntier = \"portfolio\"\nlevel_order = 0\n");
        std::fs::write(&config_path, &edited).unwrap();

        let report = init_store(&InitArgs { force: false }, root.path()).unwrap();
        assert!(!report.config_written);
        assert_eq!(report.levels_seeded, 6);
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), edited);

        let report = init_store(&InitArgs { force: true }, root.path()).unwrap();
        assert!(report.config_written);
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), CONFIG_TOML);
    }
}
