use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoordinatorError, Result};

/// Represents the complete configuration for the release coordinator.
///
/// Contains the release policy, manifest location, automation identity, commit analysis
/// settings and the verification gate.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub commit: CommitConfig,

    #[serde(default)]
    pub conventional_commits: ConventionalCommitsConfig,

    #[serde(default)]
    pub gate: GateConfig,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_tag_pattern() -> String {
    "v{version}".to_string()
}

fn default_title_pattern() -> String {
    "Release {version}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_artifacts() -> Vec<PathBuf> {
    vec![PathBuf::from("target/release/system-monitoring")]
}

/// Release policy: which branch publishes, where history starts, and how the
/// release record is shaped.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseConfig {
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Commits at or before this hash never influence the bump
    #[serde(default)]
    pub baseline: Option<String>,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_tag_pattern")]
    pub tag_pattern: String,

    #[serde(default = "default_title_pattern")]
    pub title_pattern: String,

    #[serde(default)]
    pub draft: bool,

    #[serde(default = "default_true")]
    pub latest: bool,

    /// Force-move `v<major>` to each new release
    #[serde(default)]
    pub update_major_tag: bool,

    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<PathBuf>,

    #[serde(default = "default_true")]
    pub push_release_commit: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            branch: default_branch(),
            baseline: None,
            remote: default_remote(),
            tag_pattern: default_tag_pattern(),
            title_pattern: default_title_pattern(),
            draft: false,
            latest: true,
            update_major_tag: false,
            artifacts: default_artifacts(),
            push_release_commit: true,
        }
    }
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("Cargo.toml")
}

fn default_manifest_section() -> String {
    "package".to_string()
}

fn default_manifest_field() -> String {
    "version".to_string()
}

/// Location of the version field inside the project manifest.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ManifestConfig {
    /// Relative to the repository working directory
    #[serde(default = "default_manifest_path")]
    pub path: PathBuf,

    #[serde(default = "default_manifest_section")]
    pub section: String,

    #[serde(default = "default_manifest_field")]
    pub field: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        ManifestConfig {
            path: default_manifest_path(),
            section: default_manifest_section(),
            field: default_manifest_field(),
        }
    }
}

fn default_identity_name() -> String {
    "release-bot".to_string()
}

fn default_identity_email() -> String {
    "release-bot@users.noreply.github.com".to_string()
}

fn default_message_pattern() -> String {
    "chore(release): {version} [skip ci]".to_string()
}

/// Automation identity used for the manifest commit.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CommitConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_identity_email")]
    pub email: String,

    #[serde(default = "default_message_pattern")]
    pub message_pattern: String,
}

impl Default for CommitConfig {
    fn default() -> Self {
        CommitConfig {
            name: default_identity_name(),
            email: default_identity_email(),
            message_pattern: default_message_pattern(),
        }
    }
}

/// Returns the default commit types that trigger a minor bump.
fn default_feature_types() -> Vec<String> {
    vec!["feat".to_string()]
}

/// Returns the default commit types that trigger a patch bump.
fn default_fix_types() -> Vec<String> {
    vec!["fix".to_string(), "perf".to_string()]
}

/// Returns the default list of breaking change indicators.
fn default_breaking_change_indicators() -> Vec<String> {
    vec![
        "BREAKING CHANGE:".to_string(),
        "BREAKING-CHANGE:".to_string(),
    ]
}

/// Configuration for conventional commit analysis.
///
/// Any type not listed here (docs, chore, style, ...) carries no release marker.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConventionalCommitsConfig {
    #[serde(default = "default_feature_types")]
    pub feature_types: Vec<String>,

    #[serde(default = "default_fix_types")]
    pub fix_types: Vec<String>,

    #[serde(default = "default_breaking_change_indicators")]
    pub breaking_change_indicators: Vec<String>,
}

impl Default for ConventionalCommitsConfig {
    fn default() -> Self {
        ConventionalCommitsConfig {
            feature_types: default_feature_types(),
            fix_types: default_fix_types(),
            breaking_change_indicators: default_breaking_change_indicators(),
        }
    }
}

fn default_gate_commands() -> Vec<String> {
    vec!["cargo build --release".to_string(), "cargo test".to_string()]
}

/// Build and test commands that must succeed before a tag is created.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gate_commands")]
    pub commands: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            enabled: true,
            commands: default_gate_commands(),
        }
    }
}

impl Config {
    /// Checks the invariants the coordinator relies on.
    pub fn validate(&self) -> Result<()> {
        if self.release.branch.trim().is_empty() {
            return Err(CoordinatorError::config("release.branch must not be empty"));
        }
        if self.release.tag_pattern.matches("{version}").count() != 1 {
            return Err(CoordinatorError::config(format!(
                "release.tag_pattern '{}' must contain exactly one {{version}} placeholder",
                self.release.tag_pattern
            )));
        }
        if self.manifest.field.trim().is_empty() {
            return Err(CoordinatorError::config("manifest.field must not be empty"));
        }
        if self.gate.enabled && self.gate.commands.iter().any(|c| c.trim().is_empty()) {
            return Err(CoordinatorError::config("gate.commands contains an empty command"));
        }
        Ok(())
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `release.toml` in current directory
/// 3. `release-coordinator.toml` in the user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./release.toml").exists() {
        fs::read_to_string("./release.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("release-coordinator.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| CoordinatorError::config(format!("Invalid configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}
