//! Sync configuration.
//!
//! Defaults describe the upstream ECS layout and the downstream plugins
//! repository; a JSON file passed with `--config` may override any field.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Current schema version for config files.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Pinned ECS version the generator compiles mappings for.
pub const DEFAULT_ECS_VERSION: &str = "v8.11.0";
pub const DEFAULT_ECS_ROOT: &str = "ecs";
pub const DEFAULT_GENERATOR_COMMAND: &str = "bash ecs/generator/mapping-generator.sh";
pub const DEFAULT_PLUGINS_REPO_URL: &str = "https://github.com/wazuh/wazuh-indexer-plugins.git";
pub const DEFAULT_RESOURCES_DIR: &str = "plugins/setup/src/main/resources";
pub const DEFAULT_REMOTE: &str = "origin";

const DEFAULT_REQUIRED_COMMANDS: [&str; 3] = ["git", "docker", "gh"];

const DEFAULT_MODULES: [(&str, &str); 12] = [
    ("agent", "index-template-agent.json"),
    ("alerts", "index-template-alerts.json"),
    ("commands", "index-template-commands.json"),
    ("states-fim", "index-template-fim.json"),
    ("states-inventory-hardware", "index-template-hardware.json"),
    ("states-inventory-hotfixes", "index-template-hotfixes.json"),
    ("states-inventory-networks", "index-template-networks.json"),
    ("states-inventory-packages", "index-template-packages.json"),
    ("states-inventory-ports", "index-template-ports.json"),
    ("states-inventory-processes", "index-template-processes.json"),
    ("states-inventory-system", "index-template-system.json"),
    ("states-vulnerabilities", "index-template-vulnerabilities.json"),
];

/// How generated artifacts reach the downstream repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransferPolicy {
    /// Leave the generated file in place.
    Copy,
    /// Remove the generated file after transfer.
    Move,
}

/// When the generator's `down` subcommand runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownPolicy {
    /// Once, after every module has been generated.
    Once,
    /// After each module's `run`.
    PerModule,
}

/// Per-tool timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub git_secs: u64,
    pub generator_secs: u64,
    pub gh_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            git_secs: 300,
            generator_secs: 1800,
            gh_secs: 120,
        }
    }
}

impl Timeouts {
    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git_secs)
    }

    pub fn generator(&self) -> Duration {
        Duration::from_secs(self.generator_secs)
    }

    pub fn gh(&self) -> Duration {
        Duration::from_secs(self.gh_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub schema_version: u32,
    /// Commands that must resolve on `PATH` before anything runs.
    pub required_commands: Vec<String>,
    /// Remote name used in both the source and downstream checkouts.
    pub remote: String,
    /// Directory (relative to the source checkout) holding one subdirectory per module.
    pub ecs_root: String,
    pub ecs_version: String,
    /// Generator invocation, split with shell-words; `run <module>` / `down` are appended.
    pub generator_command: String,
    pub plugins_repo_url: String,
    /// Destination directory (relative to the downstream checkout) for templates.
    pub resources_dir: String,
    /// Module name to template file name.
    pub modules: BTreeMap<String, String>,
    pub transfer: TransferPolicy,
    pub teardown: TeardownPolicy,
    pub timeouts: Timeouts,
}

impl Default for SyncConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Build the built-in configuration.
pub fn default_config() -> SyncConfig {
    SyncConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        required_commands: DEFAULT_REQUIRED_COMMANDS
            .iter()
            .map(|name| name.to_string())
            .collect(),
        remote: DEFAULT_REMOTE.to_string(),
        ecs_root: DEFAULT_ECS_ROOT.to_string(),
        ecs_version: DEFAULT_ECS_VERSION.to_string(),
        generator_command: DEFAULT_GENERATOR_COMMAND.to_string(),
        plugins_repo_url: DEFAULT_PLUGINS_REPO_URL.to_string(),
        resources_dir: DEFAULT_RESOURCES_DIR.to_string(),
        modules: DEFAULT_MODULES
            .iter()
            .map(|(module, file)| (module.to_string(), file.to_string()))
            .collect(),
        transfer: TransferPolicy::Copy,
        teardown: TeardownPolicy::Once,
        timeouts: Timeouts::default(),
    }
}

/// Load a config file; omitted fields keep their defaults.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: SyncConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Validate schema version, paths, and timeouts.
pub fn validate_config(config: &SyncConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.remote.trim().is_empty() {
        return Err(anyhow!("remote must be non-empty"));
    }
    if config.ecs_version.trim().is_empty() {
        return Err(anyhow!("ecs_version must be non-empty"));
    }
    if config.plugins_repo_url.trim().is_empty() {
        return Err(anyhow!("plugins_repo_url must be non-empty"));
    }
    validate_relative_path(&config.ecs_root, "ecs_root")?;
    validate_relative_path(&config.resources_dir, "resources_dir")?;
    generator_argv(config)?;
    let timeouts = &config.timeouts;
    if timeouts.git_secs == 0 || timeouts.generator_secs == 0 || timeouts.gh_secs == 0 {
        return Err(anyhow!("timeouts must be greater than zero"));
    }
    Ok(())
}

/// Split the configured generator command into argv.
pub fn generator_argv(config: &SyncConfig) -> Result<Vec<String>> {
    let argv = shell_words::split(&config.generator_command)
        .with_context(|| format!("parse generator_command: {}", config.generator_command))?;
    if argv.is_empty() {
        return Err(anyhow!("generator_command must be non-empty"));
    }
    Ok(argv)
}

fn validate_relative_path(rel: &str, label: &str) -> Result<()> {
    let path = Path::new(rel);
    if rel.trim().is_empty() || path.is_absolute() || has_parent_components(path) {
        return Err(anyhow!(
            "{label} must be a non-empty relative path without '..' (got {rel:?})"
        ));
    }
    Ok(())
}

fn has_parent_components(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
