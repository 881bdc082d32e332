//! Running approved commands through the host shell.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GateConfig;

/// Text returned when a command printed nothing.
pub const NO_OUTPUT: &str = "(no output)";

/// What happened to one approved command.
///
/// The exit status is kept for logging; it never reaches the agent.
#[derive(Debug)]
pub enum ExecutionResult {
    /// The process ran to completion, successfully or not.
    Completed {
        stdout: String,
        stderr: String,
        status: ExitStatus,
    },
    /// The shell could not be started.
    SpawnFailed(io::Error),
    /// The process outlived the execution timeout and was killed.
    TimedOut(Duration),
    /// The cancellation token fired and the process was killed.
    Cancelled,
}

impl ExecutionResult {
    /// Stdout followed by stderr, trimmed, or `(no output)` when that is empty.
    pub fn combined_output(stdout: &str, stderr: &str) -> String {
        let combined = format!("{stdout}{stderr}");
        let trimmed = combined.trim();
        if trimmed.is_empty() {
            NO_OUTPUT.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Flattens the result into the single string handed back to the agent.
    pub fn into_text(self) -> String {
        match self {
            ExecutionResult::Completed { stdout, stderr, .. } => {
                Self::combined_output(&stdout, &stderr)
            }
            ExecutionResult::SpawnFailed(e) => format!("Error: failed to start command: {e}"),
            ExecutionResult::TimedOut(limit) => {
                format!("Error: command timed out after {}s", limit.as_secs_f64())
            }
            ExecutionResult::Cancelled => "Error: command was cancelled".to_string(),
        }
    }
}

/// Runs a command that has already passed policy and approval.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, command: &str, cancel: &CancellationToken) -> ExecutionResult;
}

/// Runs commands with `sh -c` (`cmd /C` on Windows) in the working root.
///
/// Pipes, redirections and every other shell feature are available. Stdin is
/// detached so a command cannot compete with the approval prompt for input.
///
/// On Unix the shell leads its own process group, and a timeout or
/// cancellation kills the whole group, background jobs included. Elsewhere
/// only the shell itself is killed.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    working_root: PathBuf,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    /// Creates an executor for the configured working root and timeout.
    pub fn new(config: &Arc<GateConfig>) -> Self {
        Self {
            working_root: config.working_root().to_path_buf(),
            timeout: config.exec_timeout(),
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(command)
            .current_dir(&self.working_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Kills every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a stale group id only yields ESRCH.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %io::Error::last_os_error(), "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(&self, command: &str, cancel: &CancellationToken) -> ExecutionResult {
        if cancel.is_cancelled() {
            return ExecutionResult::Cancelled;
        }

        debug!(command, root = %self.working_root.display(), "spawning shell");
        let child = match self.command(command).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command, error = %e, "failed to start command");
                return ExecutionResult::SpawnFailed(e);
            }
        };
        let pid = child.id();
        let output = child.wait_with_output();

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(command, "command cancelled");
                kill_process_group(pid);
                return ExecutionResult::Cancelled;
            }
            output = async {
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| limit),
                    None => Ok(output.await),
                }
            } => output,
        };

        match output {
            Ok(Ok(output)) => {
                info!(command, status = %output.status, "command finished");
                ExecutionResult::Completed {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    status: output.status,
                }
            }
            Ok(Err(e)) => {
                warn!(command, error = %e, "failed to collect command output");
                ExecutionResult::SpawnFailed(e)
            }
            Err(limit) => {
                warn!(command, timeout_secs = limit.as_secs_f64(), "command timed out");
                kill_process_group(pid);
                ExecutionResult::TimedOut(limit)
            }
        }
    }
}
