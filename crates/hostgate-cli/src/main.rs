//! Hostgate command-line front end
//!
//! Runs one tool call through a [`ToolRegistry`] and prints the single string
//! result on stdout. Approval prompts and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! hostgate run-shell 'git status'
//! hostgate call '{"name": "write", "arguments": {"path": "notes.md", "content": "hi"}}'
//! HOSTGATE_DENYLIST=rm,sudo,curl hostgate --path-jail read notes.md
//! ```

use clap::{ArgAction, Parser, Subcommand};
use hostgate::{Denylist, GateConfig, Operation, ToolCall, ToolFault, ToolRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hostgate")]
#[command(about = "Gate an agent's shell and file access behind a denylist and human approval")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory that relative paths and shell commands resolve against
    #[arg(long, env = "HOSTGATE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Comma-separated command names that are never run
    #[arg(long, env = "HOSTGATE_DENYLIST", value_delimiter = ',')]
    denylist: Option<Vec<String>>,

    /// Ask before running each shell command
    #[arg(long, env = "HOSTGATE_APPROVAL_REQUIRED", default_value_t = true, action = ArgAction::Set)]
    approval_required: bool,

    /// Seconds to wait for an approval answer before rejecting
    #[arg(long, env = "HOSTGATE_APPROVAL_TIMEOUT_SECS")]
    approval_timeout_secs: Option<u64>,

    /// Seconds an approved command may run before it is killed
    #[arg(long, env = "HOSTGATE_EXEC_TIMEOUT_SECS")]
    exec_timeout_secs: Option<u64>,

    /// Refuse file paths that resolve outside the root
    #[arg(long, env = "HOSTGATE_PATH_JAIL")]
    path_jail: bool,

    /// Check every command of a pipeline or list against the denylist
    #[arg(long, env = "HOSTGATE_INSPECT_COMPOUND")]
    inspect_compound: bool,

    #[command(subcommand)]
    tool: Tool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Tool {
    /// Print the tool descriptions as JSON
    Tools,
    /// Run one tool call given as JSON: {"name": ..., "arguments": ...}
    Call { json: String },
    /// Read a text file
    Read { path: String },
    /// Write a text file
    Write { path: String, content: String },
    /// Run a shell command after approval
    RunShell { cmd: String },
    /// Multiply two integers
    Calculator {
        #[arg(allow_hyphen_values = true)]
        a: i64,
        #[arg(allow_hyphen_values = true)]
        b: i64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Fault(#[from] ToolFault),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Args {
    fn gate_config(&self) -> GateConfig {
        let mut config = GateConfig::new(&self.root)
            .with_approval_required(self.approval_required)
            .with_path_jail(self.path_jail)
            .with_compound_inspection(self.inspect_compound);
        if let Some(names) = &self.denylist {
            config = config.with_denylist(Denylist::new(
                names.iter().map(|name| name.trim()).filter(|name| !name.is_empty()),
            ));
        }
        if let Some(secs) = self.approval_timeout_secs {
            config = config.with_approval_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.exec_timeout_secs {
            config = config.with_exec_timeout(Duration::from_secs(secs));
        }
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        "hostgate=trace"
    } else {
        "hostgate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("hostgate: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(args));
    // A cancelled prompt leaves a blocking thread parked on stdin.
    runtime.shutdown_background();

    match result {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("hostgate: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<String, CliError> {
    let config = args.gate_config();
    info!(
        root = %config.working_root().display(),
        denylist = ?config.denylist().iter().collect::<Vec<_>>(),
        approval_required = config.approval_required(),
        "starting hostgate"
    );

    let registry = ToolRegistry::new(config);
    let cancel = registry.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let text = match args.tool {
        Tool::Tools => serde_json::to_string_pretty(&registry.specs())?,
        Tool::Call { json } => {
            let call: ToolCall = serde_json::from_str(&json)?;
            registry.call(&call).await?
        }
        Tool::Read { path } => registry.read(&path).await,
        Tool::Write { path, content } => registry.write(&path, &content).await?,
        Tool::RunShell { cmd } => registry.run_shell(&cmd).await,
        Tool::Calculator { a, b } => registry.dispatch(Operation::Calculator { a, b }).await?,
    };
    Ok(text)
}
