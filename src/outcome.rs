use crate::approval::ApprovalError;
use crate::sandbox::ExecutionResult;

/// Text returned when the operator declines a command.
pub const REJECTED_BY_USER: &str = "Command rejected by user.";

/// How a `run_shell` call left the gate.
///
/// Only [`ShellOutcome::Executed`] means a process was spawned.
#[derive(Debug)]
pub enum ShellOutcome {
    /// The policy engine refused the command.
    Blocked { command: String, token: String },
    /// The command was not approved.
    Rejected(Rejection),
    /// The command ran.
    Executed(ExecutionResult),
}

/// Why an approval did not happen.
#[derive(Debug)]
pub enum Rejection {
    /// The operator answered with anything other than `y`.
    Declined,
    /// No answer arrived: the wait was cancelled, timed out, or the prompt failed.
    Unanswered(ApprovalError),
}

impl ShellOutcome {
    /// Returns `true` if a process was spawned for this call.
    pub fn executed(&self) -> bool {
        matches!(self, ShellOutcome::Executed(_))
    }

    /// Flattens the outcome into the single string handed back to the agent.
    ///
    /// Blocks and rejections are plain sentences, distinguishable only by
    /// their wording.
    pub fn into_text(self) -> String {
        match self {
            ShellOutcome::Blocked { command, .. } => {
                format!("Error: Command '{command}' is blocked for safety.")
            }
            ShellOutcome::Rejected(Rejection::Declined) => REJECTED_BY_USER.to_string(),
            ShellOutcome::Rejected(Rejection::Unanswered(e)) => format!("Command rejected: {e}."),
            ShellOutcome::Executed(result) => result.into_text(),
        }
    }
}
