use super::{CommandFailure, CommandOutcome, LifecycleRunner, Subcommand};
use crate::traits::{CommandExecutor, CommandTimedOut};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Supported infrastructure tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Terraform,
    #[serde(alias = "opentofu")]
    #[value(alias = "opentofu")]
    Tofu,
}

impl Tool {
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Terraform => "terraform",
            Tool::Tofu => "tofu",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Lifecycle runner backed by a real tool binary
pub struct ToolRunner {
    tool: Tool,
    command: Arc<dyn CommandExecutor>,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ToolRunner {
    pub fn new(tool: Tool, command: Arc<dyn CommandExecutor>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            command,
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_args(subcommand: Subcommand, args: &[String]) -> Vec<String> {
        let mut full = vec![subcommand.as_str().to_string()];

        if subcommand == Subcommand::Apply && !args.iter().any(|arg| arg == "-auto-approve") {
            full.push("-auto-approve".to_string());
        }

        full.extend(args.iter().cloned());
        full
    }

    fn failure_from(&self, subcommand: Subcommand, err: anyhow::Error) -> CommandFailure {
        match err.downcast_ref::<CommandTimedOut>() {
            Some(timed_out) => CommandFailure::timed_out(subcommand, timed_out.timeout),
            None => CommandFailure::spawn_failed(subcommand, format!("{:#}", err)),
        }
    }
}

impl LifecycleRunner for ToolRunner {
    fn tool_name(&self) -> &str {
        self.tool.binary()
    }

    fn check_installed(&self) -> Result<(), CommandFailure> {
        let output = self
            .command
            .execute(self.tool.binary(), &["version"], &self.working_dir, self.timeout)
            .map_err(|e| {
                CommandFailure::spawn_failed(
                    Subcommand::Init,
                    format!("{} is not installed or not in PATH ({:#})", self.tool, e),
                )
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CommandFailure::spawn_failed(
                Subcommand::Init,
                format!(
                    "'{} version' failed: {}",
                    self.tool,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }

    fn run(&self, subcommand: Subcommand, args: &[String]) -> Result<CommandOutcome, CommandFailure> {
        let full = Self::command_args(subcommand, args);
        let full: Vec<&str> = full.iter().map(String::as_str).collect();

        if subcommand.streams_output() {
            let exit_code = self
                .command
                .execute_interactive(self.tool.binary(), &full, &self.working_dir, self.timeout)
                .map_err(|e| self.failure_from(subcommand, e))?;

            return if exit_code == 0 {
                Ok(CommandOutcome::default())
            } else {
                Err(CommandFailure::non_zero(
                    subcommand,
                    exit_code,
                    String::new(),
                    String::new(),
                ))
            };
        }

        let output = self
            .command
            .execute(self.tool.binary(), &full, &self.working_dir, self.timeout)
            .map_err(|e| self.failure_from(subcommand, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        if output.status.success() {
            Ok(CommandOutcome {
                exit_code,
                stdout,
                stderr,
            })
        } else {
            Err(CommandFailure::non_zero(subcommand, exit_code, stdout, stderr))
        }
    }
}
