//! Run settings.
//!
//! Layered from highest to lowest precedence: command-line flags (and their
//! environment fallbacks), `.vpc-import.yaml` in the project directory, the
//! `aws_region` attribute of `terraform.tfvars`, built-in defaults.

use crate::lifecycle::Tool;
use crate::store::ConfigStore;
use crate::traits::FileSystem;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Optional settings file in the project directory
pub const SETTINGS_FILE: &str = ".vpc-import.yaml";

pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_DESCRIBE_TIMEOUT_SECS: u64 = 120;

/// Contents of `.vpc-import.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub tool: Option<Tool>,
    pub region: Option<String>,
    pub aws_profile: Option<String>,
    /// Timeout for `init`, `import`, `plan` and `apply`; 0 disables it
    pub command_timeout_secs: Option<u64>,
    /// Timeout for each provider query; 0 disables it
    pub describe_timeout_secs: Option<u64>,
    pub allow_partial_failures: Option<bool>,
}

impl SettingsFile {
    /// Load settings from a YAML file
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let content = fs.read_to_string(path)?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Load the project's settings file, or defaults when there is none
    pub fn load(fs: &dyn FileSystem, project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(SETTINGS_FILE);

        if !fs.is_file(&path) {
            return Ok(Self::default());
        }

        Self::from_file(fs, &path)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub tool: Option<Tool>,
    pub region: Option<String>,
    pub aws_profile: Option<String>,
    /// Only ever turns the setting on
    pub allow_partial_failures: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tool: Tool,
    /// Empty when the provider default applies
    pub region: String,
    pub aws_profile: Option<String>,
    pub command_timeout: Option<Duration>,
    pub describe_timeout: Option<Duration>,
    pub allow_partial_failures: bool,
}

impl Settings {
    /// Merge the layers
    pub fn resolve(cli: &CliOverrides, file: &SettingsFile, tfvars_region: Option<&str>) -> Self {
        let region = non_blank(cli.region.as_deref())
            .or_else(|| non_blank(file.region.as_deref()))
            .or_else(|| non_blank(tfvars_region))
            .unwrap_or_default();

        let aws_profile = non_blank(cli.aws_profile.as_deref())
            .or_else(|| non_blank(file.aws_profile.as_deref()));

        Self {
            tool: cli.tool.or(file.tool).unwrap_or_default(),
            region,
            aws_profile,
            command_timeout: timeout(file.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS),
            describe_timeout: timeout(file.describe_timeout_secs, DEFAULT_DESCRIBE_TIMEOUT_SECS),
            allow_partial_failures: cli.allow_partial_failures
                || file.allow_partial_failures.unwrap_or(false),
        }
    }

    /// Read the settings file and tfvars region of the store's project
    pub fn load(fs: &dyn FileSystem, store: &ConfigStore, cli: &CliOverrides) -> Result<Self> {
        let file = SettingsFile::load(fs, store.project_dir())?;

        // A broken tfvars file surfaces as a fatal error once the run loads it
        let tfvars_region = store.region().ok().flatten();

        Ok(Self::resolve(cli, &file, tfvars_region.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn timeout(secs: Option<u64>, default: u64) -> Option<Duration> {
    match secs.unwrap_or(default) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}
