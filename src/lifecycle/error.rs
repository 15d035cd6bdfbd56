use super::Subcommand;
use std::fmt;
use std::time::Duration;

/// Why a lifecycle command did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The tool ran and exited with a non-zero status
    NonZeroExit,
    /// The tool was killed after the configured timeout
    TimedOut(Duration),
    /// The tool could not be started at all
    SpawnFailed(String),
}

/// A failed lifecycle command with everything it printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub subcommand: Subcommand,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub kind: FailureKind,
}

impl CommandFailure {
    pub fn non_zero(subcommand: Subcommand, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            subcommand,
            exit_code: Some(exit_code),
            stdout,
            stderr,
            kind: FailureKind::NonZeroExit,
        }
    }

    pub fn timed_out(subcommand: Subcommand, timeout: Duration) -> Self {
        Self {
            subcommand,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            kind: FailureKind::TimedOut(timeout),
        }
    }

    pub fn spawn_failed(subcommand: Subcommand, message: impl Into<String>) -> Self {
        Self {
            subcommand,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            kind: FailureKind::SpawnFailed(message.into()),
        }
    }

    /// Last non-empty line of stderr, falling back to stdout
    pub fn summary(&self) -> Option<&str> {
        [&self.stderr, &self.stdout]
            .into_iter()
            .flat_map(|stream| stream.lines().rev())
            .map(str::trim)
            .find(|line| !line.is_empty())
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::NonZeroExit => {
                write!(f, "{} failed", self.subcommand)?;
                if let Some(code) = self.exit_code {
                    write!(f, " with exit code {}", code)?;
                }
                if let Some(summary) = self.summary() {
                    write!(f, ": {}", summary)?;
                }
                Ok(())
            }
            FailureKind::TimedOut(timeout) => {
                write!(
                    f,
                    "{} timed out after {}s",
                    self.subcommand,
                    timeout.as_secs()
                )
            }
            FailureKind::SpawnFailed(message) => {
                write!(f, "{} could not be started: {}", self.subcommand, message)
            }
        }
    }
}

impl std::error::Error for CommandFailure {}
