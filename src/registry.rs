//! The tool surface presented to the agent loop.
//!
//! Every tool takes its arguments by name or position and returns one string.
//! `run_shell` is the only path to the sandbox, and it always passes the
//! policy engine and the approval gate first.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalDecision, ApprovalGate, Prompter, TerminalPrompter};
use crate::config::GateConfig;
use crate::files::{FileError, Workspace};
use crate::operation::{Operation, ToolCall};
use crate::outcome::{Rejection, ShellOutcome};
use crate::policy::{PolicyEngine, Verdict};
use crate::sandbox::{Executor, ShellExecutor};

/// A failure that cannot be expressed as a tool's text result.
#[derive(Debug, thiserror::Error)]
pub enum ToolFault {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    /// The environment refused a write, e.g. the disk is full or read-only.
    #[error(transparent)]
    Environment(FileError),
}

/// Describes one tool to an agent loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the keyword arguments; positional order follows `required`.
    pub parameters: Value,
}

/// Dispatches tool calls to the gate's components.
///
/// # Example
///
/// ```no_run
/// use hostgate::{GateConfig, ToolRegistry};
///
/// # async fn demo() {
/// let registry = ToolRegistry::new(GateConfig::new("."));
/// // Prompts on the terminal before running.
/// let output = registry.run_shell("git status").await;
/// println!("{output}");
/// # }
/// ```
pub struct ToolRegistry {
    config: Arc<GateConfig>,
    policy: PolicyEngine,
    gate: ApprovalGate,
    executor: Arc<dyn Executor>,
    workspace: Workspace,
    cancel: CancellationToken,
}

impl ToolRegistry {
    /// Creates a registry that prompts on the terminal and runs commands with
    /// the host shell.
    pub fn new(config: GateConfig) -> Self {
        let config = config.shared();
        Self {
            policy: PolicyEngine::new(config.clone()),
            gate: ApprovalGate::new(config.clone(), Arc::new(TerminalPrompter)),
            executor: Arc::new(ShellExecutor::new(&config)),
            workspace: Workspace::new(&config),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Replaces the source of approval answers.
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.gate = ApprovalGate::new(self.config.clone(), prompter);
        self
    }

    /// Replaces the component that runs approved commands.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Uses `cancel` to abort pending approvals and running commands.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The configuration every component of this registry was built from.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The token that aborts pending approvals and running commands.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Describes every tool this registry serves.
    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: Operation::WRITE,
                description: "Write UTF-8 text to a file relative to the working directory, \
                    creating parent directories and replacing existing content. \
                    Returns the number of bytes written and the file path.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File path relative to the working directory" },
                        "content": { "type": "string", "description": "Text content to write" }
                    },
                    "required": ["path", "content"]
                }),
            },
            ToolSpec {
                name: Operation::READ,
                description: "Read UTF-8 text from a file relative to the working directory. \
                    Returns the file contents, or an error message if it cannot be read.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File path relative to the working directory" }
                    },
                    "required": ["path"]
                }),
            },
            ToolSpec {
                name: Operation::RUN_SHELL,
                description: "Run a shell command after human approval. Commands starting with a \
                    blocked word are refused. Returns stdout followed by stderr, or a \
                    rejection message.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "cmd": { "type": "string", "description": "Shell command to execute, e.g. 'git status' or 'ls -la'" }
                    },
                    "required": ["cmd"]
                }),
            },
            ToolSpec {
                name: Operation::CALCULATOR,
                description: "Multiply two integers and return the product.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "a": { "type": "integer", "description": "The first integer" },
                        "b": { "type": "integer", "description": "The second integer" }
                    },
                    "required": ["a", "b"]
                }),
            },
        ]
    }

    /// Decodes and runs one tool call, returning its text result.
    pub async fn call(&self, call: &ToolCall) -> Result<String, ToolFault> {
        debug!(tool = %call.name, "tool call");
        let operation = Operation::from_call(call)?;
        self.dispatch(operation).await
    }

    /// Runs a decoded operation, returning its text result.
    pub async fn dispatch(&self, operation: Operation) -> Result<String, ToolFault> {
        match operation {
            Operation::Write { path, content } => self.write(&path, &content).await,
            Operation::Read { path } => Ok(self.read(&path).await),
            Operation::RunShell { command } => Ok(self.run_shell(&command).await),
            Operation::Calculator { a, b } => Ok(calculator(a, b)),
        }
    }

    /// The `write` tool. Only environment faults are returned as errors.
    pub async fn write(&self, path: &str, content: &str) -> Result<String, ToolFault> {
        match self.workspace.write(path, content).await {
            Ok(receipt) => Ok(receipt.to_string()),
            Err(e @ FileError::Write { .. }) => {
                warn!(path, error = %e, "write failed");
                Err(ToolFault::Environment(e))
            }
            Err(e) => Ok(e.to_string()),
        }
    }

    /// The `read` tool. Failures come back as an error sentence.
    pub async fn read(&self, path: &str) -> String {
        match self.workspace.read(path).await {
            Ok(content) => content,
            Err(e) => {
                debug!(path, error = %e, "read failed");
                e.to_string()
            }
        }
    }

    /// The `run_shell` tool.
    pub async fn run_shell(&self, command: &str) -> String {
        self.run_shell_outcome(command).await.into_text()
    }

    /// Passes `command` through policy, approval and execution, in that order,
    /// stopping at the first refusal.
    pub async fn run_shell_outcome(&self, command: &str) -> ShellOutcome {
        if let Verdict::Blocked { token } = self.policy.classify(command) {
            info!(command, token, "command blocked by denylist");
            return ShellOutcome::Blocked {
                command: command.to_owned(),
                token,
            };
        }

        match self.gate.confirm(command, &self.cancel).await {
            Ok(ApprovalDecision::Approved) => {}
            Ok(ApprovalDecision::Rejected) => {
                info!(command, "command rejected by operator");
                return ShellOutcome::Rejected(Rejection::Declined);
            }
            Err(e) => {
                warn!(command, error = %e, "approval not obtained");
                return ShellOutcome::Rejected(Rejection::Unanswered(e));
            }
        }

        ShellOutcome::Executed(self.executor.execute(command, &self.cancel).await)
    }
}

/// The `calculator` tool.
fn calculator(a: i64, b: i64) -> String {
    match a.checked_mul(b) {
        Some(product) => product.to_string(),
        None => format!("Error: {a} * {b} overflows a 64-bit integer"),
    }
}
