use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::db::STORE_DIR;
use crate::model::health::MAX_LIFETIME_DAYS;
use crate::model::level::{BacklogLevel, default_levels};

/// Project configuration read from `.moda/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub rollup: RollupConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default = "default_levels")]
    pub levels: Vec<BacklogLevel>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            rollup: RollupConfig::default(),
            health: HealthConfig::default(),
            levels: default_levels(),
        }
    }
}

impl ProjectConfig {
    /// Reject level tables the store would refuse: blank or duplicate names,
    /// or two levels sharing a tier and order.
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending level.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut slots = HashSet::new();
        for level in &self.levels {
            let name = level.name.trim();
            if name.is_empty() {
                bail!("backlog level names must not be blank");
            }
            if !names.insert(name.to_ascii_lowercase()) {
                bail!("backlog level '{name}' is declared twice");
            }
            if !slots.insert((level.tier, level.level_order)) {
                bail!(
                    "backlog level '{name}' reuses {} order {}",
                    level.tier,
                    level.level_order
                );
            }
        }
        let days = self.health.default_expiration_days;
        if days == 0 || days > MAX_LIFETIME_DAYS {
            bail!("health.default_expiration_days must be between 1 and {MAX_LIFETIME_DAYS}, got {days}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Team used by `moda rollup` when neither `--team` nor `--root` is given.
    #[serde(default)]
    pub default_team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_expiration_days")]
    pub default_expiration_days: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_expiration_days: default_expiration_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.moda/config.toml` under `project_root`, falling back to defaults
/// when the file is absent.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(STORE_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid {}", path.display()))?;
    Ok(config)
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("moda/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project and user config and settle the output mode.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or invalid.
pub fn resolve_config(project_root: &Path, cli_format: Option<&str>) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_format, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// Normalize an output mode name. Unknown names yield `None`.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

/// Flag, then `FORMAT`, then user config, then a TTY check.
fn resolve_output(cli: Option<&str>, user_output: Option<&str>, env_format: Option<&str>) -> String {
    [cli, env_format, user_output]
        .into_iter()
        .flatten()
        .find_map(normalize_output_mode)
        .map_or_else(
            || {
                if std::io::stdout().is_terminal() {
                    "pretty".to_string()
                } else {
                    "text".to_string()
                }
            },
            str::to_string,
        )
}

const fn default_expiration_days() -> u32 {
    14
}
