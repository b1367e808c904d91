//! Shell command executor
//!
//! Every stage command goes through [`CommandExecutor::execute`], which always
//! yields a [`CommandResult`]. Timeouts and spawn/IO faults are folded into the
//! result instead of being returned as errors.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Marker at the start of `stderr` when the command could not be run at all
pub const EXECUTION_EXCEPTION_MARKER: &str = "ExecutionException";

/// Captured outcome of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,

    /// The command exceeded its bound and was abandoned. No output is kept.
    pub timed_out: bool,

    /// Exit code, absent on timeout, spawn fault or signal termination
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn timeout(command: &str) -> Self {
        Self {
            command: command.to_string(),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
            exit_code: None,
        }
    }

    pub fn exception(command: &str, error: &std::io::Error) -> Self {
        Self {
            command: command.to_string(),
            stdout: String::new(),
            stderr: format!("{}: {}", EXECUTION_EXCEPTION_MARKER, error),
            timed_out: false,
            exit_code: None,
        }
    }

    /// The command could not be spawned or communicated with
    pub fn is_exception(&self) -> bool {
        self.stderr.starts_with(EXECUTION_EXCEPTION_MARKER)
    }
}

/// Runs shell commands with a wall-clock bound
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` and capture its output. Never fails.
    async fn execute(&self, command: &str, timeout: Duration) -> CommandResult;
}

/// Executor that runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Use a specific shell binary
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandResult, std::io::Error> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the output future on timeout drops the child, which kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(CommandResult {
                    command: command.to_string(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                    exit_code: output.status.code(),
                })
            }
            Err(_) => Ok(CommandResult::timeout(command)),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        debug!(command = %command, timeout_secs = timeout.as_secs_f64(), "executing command");
        let started = Instant::now();

        let result = match self.run(command, timeout).await {
            Ok(result) => result,
            Err(e) => {
                warn!(command = %command, error = %e, "command could not be executed");
                CommandResult::exception(command, &e)
            }
        };

        if result.timed_out {
            warn!(command = %command, timeout_secs = timeout.as_secs_f64(), "command timed out");
        } else {
            debug!(
                command = %command,
                exit_code = ?result.exit_code,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "command finished"
            );
        }
        result
    }
}
