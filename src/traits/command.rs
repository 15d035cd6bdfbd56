use anyhow::{Context, Result};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error returned when a child process outlives its deadline and is killed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTimedOut {
    pub command: String,
    pub timeout: Duration,
}

impl fmt::Display for CommandTimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' did not finish within {}s and was killed",
            self.command,
            self.timeout.as_secs()
        )
    }
}

impl std::error::Error for CommandTimedOut {}

/// Trait for executing system commands, allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments and capture its output
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<Output>;

    /// Execute a command interactively (inherits stdin/stdout/stderr) and
    /// return its exit code
    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<i32>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<Output> {
        let mut cmd = Command::new(command);
        cmd.args(args).current_dir(working_dir);

        let Some(timeout) = timeout else {
            return cmd
                .output()
                .with_context(|| format!("Failed to execute {}", command));
        };

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", command))?;

        // Drain both pipes while polling so a chatty child cannot block on a
        // full pipe buffer.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let Some(status) = wait_with_deadline(&mut child, timeout)? else {
            return Err(CommandTimedOut {
                command: command.to_string(),
                timeout,
            }
            .into());
        };

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<i32> {
        let mut child = Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to execute {}", command))?;

        let status = match timeout {
            Some(timeout) => match wait_with_deadline(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    return Err(CommandTimedOut {
                        command: command.to_string(),
                        timeout,
                    }
                    .into());
                }
            },
            None => child
                .wait()
                .with_context(|| format!("Failed to wait for {}", command))?,
        };

        Ok(status.code().unwrap_or(-1))
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Poll the child until it exits or the deadline passes.
///
/// Returns `None` when the deadline passed; the child has been killed and
/// reaped by then.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait().context("Failed to poll child process")? {
            return Ok(Some(status));
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Mock command executor for testing
#[cfg(test)]
pub struct MockCommandExecutor {
    /// Pre-configured outputs for commands
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    /// Every invocation, in order
    calls: std::sync::Mutex<Vec<MockCall>>,
}

#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct MockCommandResult {
    pub command: String,
    /// Only match invocations whose arguments contain this value
    pub when_arg: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

#[cfg(test)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockCall {
    pub command: String,
    pub args: Vec<String>,
    pub interactive: bool,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn take_result(
        &self,
        command: &str,
        args: &[&str],
        interactive: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<MockCommandResult>> {
        self.calls.lock().unwrap().push(MockCall {
            command: command.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            interactive,
        });

        let mut outputs = self.outputs.lock().unwrap();
        let position = outputs.iter().position(|r| {
            r.command == command
                && r
                    .when_arg
                    .as_deref()
                    .is_none_or(|wanted| args.contains(&wanted))
        });

        let Some(position) = position else {
            return Ok(None);
        };

        let result = outputs.remove(position);
        if result.timed_out {
            return Err(CommandTimedOut {
                command: command.to_string(),
                timeout: timeout.unwrap_or_default(),
            }
            .into());
        }

        Ok(Some(result))
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        _working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<Output> {
        // Default: successful empty output
        let result = self
            .take_result(command, args, false, timeout)?
            .unwrap_or_default();

        Ok(Output {
            status: create_exit_status(result.exit_code),
            stdout: result.stdout.into_bytes(),
            stderr: result.stderr.into_bytes(),
        })
    }

    fn execute_interactive(
        &self,
        command: &str,
        args: &[&str],
        _working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<i32> {
        Ok(self
            .take_result(command, args, true, timeout)?
            .map(|result| result.exit_code)
            .unwrap_or(0))
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> ExitStatus {
    // ExitStatus can't be constructed directly; build it from a raw wait status
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }
}
