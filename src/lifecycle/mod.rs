//! Infrastructure tool lifecycle (`init`, `import`, `plan`, `apply`)

pub mod error;
pub mod tool;

pub use error::{CommandFailure, FailureKind};
pub use tool::{Tool, ToolRunner};

use crate::resource::ResourceId;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Resource type of the imported collection
pub const RESOURCE_TYPE: &str = "aws_vpc";
/// Name of the imported collection
pub const RESOURCE_NAME: &str = "my_existing_vpc";

lazy_static! {
    static ref ALREADY_MANAGED: Regex =
        Regex::new(r"(?i)resource already managed by")
            .expect("Invalid already-managed pattern regex");
}

/// Lifecycle subcommands of the infrastructure tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    Init,
    Import,
    Plan,
    Apply,
}

impl Subcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcommand::Init => "init",
            Subcommand::Import => "import",
            Subcommand::Plan => "plan",
            Subcommand::Apply => "apply",
        }
    }

    /// Whether the tool output goes straight to the terminal.
    ///
    /// `import` is captured so failures can be reported per identifier.
    pub fn streams_output(&self) -> bool {
        !matches!(self, Subcommand::Import)
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful lifecycle command. Output is empty for streamed subcommands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs lifecycle subcommands of the infrastructure tool
pub trait LifecycleRunner {
    /// Name of the tool binary, for log lines
    fn tool_name(&self) -> &str;

    /// Verify the tool binary can be started
    fn check_installed(&self) -> Result<(), CommandFailure>;

    /// Run one subcommand with extra arguments. No retries.
    fn run(&self, subcommand: Subcommand, args: &[String]) -> Result<CommandOutcome, CommandFailure>;
}

/// Tool address of the collection member keyed by `id`
pub fn import_address(id: &ResourceId) -> String {
    format!("{}.{}[\"{}\"]", RESOURCE_TYPE, RESOURCE_NAME, id.as_str())
}

/// Whether a failed import only reports that the address is already in state
pub fn is_already_managed(failure: &CommandFailure) -> bool {
    failure.subcommand == Subcommand::Import
        && failure.kind == FailureKind::NonZeroExit
        && (ALREADY_MANAGED.is_match(&failure.stderr) || ALREADY_MANAGED.is_match(&failure.stdout))
}

/// Scripted runner recording every invocation
#[cfg(test)]
pub struct FakeRunner {
    failures: std::sync::Mutex<Vec<(Subcommand, Option<String>, CommandFailure)>>,
    calls: std::sync::Mutex<Vec<(Subcommand, Vec<String>)>>,
    installed: bool,
}

#[cfg(test)]
impl FakeRunner {
    pub fn new() -> Self {
        Self {
            failures: std::sync::Mutex::new(Vec::new()),
            calls: std::sync::Mutex::new(Vec::new()),
            installed: true,
        }
    }

    pub fn not_installed(mut self) -> Self {
        self.installed = false;
        self
    }

    /// Fail the first `subcommand` invocation (whose arguments contain
    /// `when_arg`, if given)
    pub fn failing(self, subcommand: Subcommand, when_arg: Option<&str>, stderr: &str) -> Self {
        self.failures.lock().unwrap().push((
            subcommand,
            when_arg.map(str::to_string),
            CommandFailure::non_zero(subcommand, 1, String::new(), stderr.to_string()),
        ));
        self
    }

    pub fn calls(&self) -> Vec<(Subcommand, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subcommands(&self) -> Vec<Subcommand> {
        self.calls().into_iter().map(|(subcommand, _)| subcommand).collect()
    }
}

#[cfg(test)]
impl LifecycleRunner for FakeRunner {
    fn tool_name(&self) -> &str {
        "terraform"
    }

    fn check_installed(&self) -> Result<(), CommandFailure> {
        if self.installed {
            Ok(())
        } else {
            Err(CommandFailure::spawn_failed(
                Subcommand::Init,
                "terraform: command not found",
            ))
        }
    }

    fn run(&self, subcommand: Subcommand, args: &[String]) -> Result<CommandOutcome, CommandFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((subcommand, args.to_vec()));

        let mut failures = self.failures.lock().unwrap();
        let position = failures.iter().position(|(wanted, when_arg, _)| {
            *wanted == subcommand && when_arg.as_ref().is_none_or(|arg| args.contains(arg))
        });

        match position {
            Some(position) => Err(failures.remove(position).2),
            None => Ok(CommandOutcome::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_address() {
        let id = ResourceId::new("vpc-0abc").unwrap();
        assert_eq!(import_address(&id), "aws_vpc.my_existing_vpc[\"vpc-0abc\"]");
    }

    #[test]
    fn test_streaming_subcommands() {
        assert!(Subcommand::Init.streams_output());
        assert!(Subcommand::Plan.streams_output());
        assert!(Subcommand::Apply.streams_output());
        assert!(!Subcommand::Import.streams_output());
    }

    #[test]
    fn test_is_already_managed() {
        let managed = CommandFailure::non_zero(
            Subcommand::Import,
            1,
            String::new(),
            "Error: Resource already managed by Terraform\n".to_string(),
        );
        assert!(is_already_managed(&managed));

        let tofu = CommandFailure::non_zero(
            Subcommand::Import,
            1,
            "Error: Resource already managed by OpenTofu".to_string(),
            String::new(),
        );
        assert!(is_already_managed(&tofu));

        let missing = CommandFailure::non_zero(
            Subcommand::Import,
            1,
            String::new(),
            "Error: Cannot import non-existent remote object".to_string(),
        );
        assert!(!is_already_managed(&missing));
    }

    #[test]
    fn test_fake_runner_fails_matching_call_once() {
        let runner = FakeRunner::new().failing(Subcommand::Import, Some("vpc-2"), "boom");
        let args = |id: &str| vec!["addr".to_string(), id.to_string()];

        assert!(runner.run(Subcommand::Import, &args("vpc-1")).is_ok());
        assert!(runner.run(Subcommand::Import, &args("vpc-2")).is_err());
        assert!(runner.run(Subcommand::Import, &args("vpc-2")).is_ok());
        assert_eq!(runner.calls().len(), 3);
    }
}
