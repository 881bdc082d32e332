//! Hostgate: an action-gating layer between an agent loop and the host machine.
//!
//! Hostgate mediates an agent's **shell** and **file** access. Every shell
//! command passes a denylist **policy**, then a human **approval** prompt,
//! and only then the **sandbox** that runs it. File reads and writes are plain
//! UTF-8 text relative to a working root.
//!
//! Every tool returns a single string. Refusals are ordinary text the agent
//! can read, not errors.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hostgate::{Denylist, GateConfig, ScriptedPrompter, ToolRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let root = std::env::temp_dir();
//! let config = GateConfig::new(&root).with_denylist(Denylist::new(["rm", "sudo"]));
//! let registry = ToolRegistry::new(config)
//!     .with_prompter(Arc::new(ScriptedPrompter::new(["n"])));
//!
//! // Blocked before anyone is asked.
//! assert_eq!(
//!     registry.run_shell("rm -rf /").await,
//!     "Error: Command 'rm -rf /' is blocked for safety.",
//! );
//!
//! // Asked, and declined.
//! assert_eq!(registry.run_shell("ls").await, "Command rejected by user.");
//! # }
//! ```

mod approval;
mod config;
mod denylist;
mod files;
mod operation;
mod outcome;
mod policy;
mod registry;
mod sandbox;
pub mod shell;

pub use approval::{
    ApprovalDecision, ApprovalError, ApprovalGate, Prompter, ScriptedPrompter, TerminalPrompter,
};
pub use config::GateConfig;
pub use denylist::{DEFAULT_DENYLIST, Denylist};
pub use files::{FileError, Workspace, WriteReceipt};
pub use operation::{Operation, ToolCall};
pub use outcome::{REJECTED_BY_USER, Rejection, ShellOutcome};
pub use policy::{PolicyEngine, Verdict};
pub use registry::{ToolFault, ToolRegistry, ToolSpec};
pub use sandbox::{ExecutionResult, Executor, NO_OUTPUT, ShellExecutor};
