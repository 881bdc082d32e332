use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ToolFault;

/// A tool invocation as it arrives from the agent loop.
///
/// `arguments` is either a JSON object (keyword arguments) or a JSON array
/// (positional arguments, in the order of the tool's signature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// Creates a call of tool `name` with the given JSON arguments.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// A decoded, typed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Write UTF-8 text to a file under the working root.
    Write { path: String, content: String },
    /// Read UTF-8 text from a file under the working root.
    Read { path: String },
    /// Run a shell command through policy, approval and the sandbox.
    RunShell { command: String },
    /// Multiply two integers.
    Calculator { a: i64, b: i64 },
}

impl Operation {
    pub const WRITE: &'static str = "write";
    pub const READ: &'static str = "read";
    pub const RUN_SHELL: &'static str = "run_shell";
    pub const CALCULATOR: &'static str = "calculator";

    /// Decodes a tool call into an operation.
    ///
    /// `write_text` and `read_text` are accepted as aliases of `write` and
    /// `read`, and `command` as an alias of `run_shell`'s `cmd` argument.
    ///
    /// # Example
    ///
    /// ```
    /// use hostgate::{Operation, ToolCall};
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("write", json!({"path": "a.txt", "content": "hi"}));
    /// assert_eq!(
    ///     Operation::from_call(&call).unwrap(),
    ///     Operation::Write { path: "a.txt".into(), content: "hi".into() },
    /// );
    ///
    /// let call = ToolCall::new("run_shell", json!(["ls -la"]));
    /// assert_eq!(
    ///     Operation::from_call(&call).unwrap(),
    ///     Operation::RunShell { command: "ls -la".into() },
    /// );
    /// ```
    pub fn from_call(call: &ToolCall) -> Result<Self, ToolFault> {
        let args = &call.arguments;
        match call.name.as_str() {
            Self::WRITE | "write_text" => {
                let WriteArgs { path, content } = decode(Self::WRITE, args)?;
                Ok(Operation::Write { path, content })
            }
            Self::READ | "read_text" => {
                let ReadArgs { path } = decode(Self::READ, args)?;
                Ok(Operation::Read { path })
            }
            Self::RUN_SHELL => {
                let ShellArgs { cmd } = decode(Self::RUN_SHELL, args)?;
                Ok(Operation::RunShell { command: cmd })
            }
            Self::CALCULATOR => {
                let CalculatorArgs { a, b } = decode(Self::CALCULATOR, args)?;
                Ok(Operation::Calculator { a, b })
            }
            other => Err(ToolFault::UnknownTool(other.to_string())),
        }
    }

    /// The canonical name of the tool this operation invokes.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Operation::Write { .. } => Self::WRITE,
            Operation::Read { .. } => Self::READ,
            Operation::RunShell { .. } => Self::RUN_SHELL,
            Operation::Calculator { .. } => Self::CALCULATOR,
        }
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
}

#[derive(Deserialize)]
struct ShellArgs {
    #[serde(alias = "command")]
    cmd: String,
}

#[derive(Deserialize)]
struct CalculatorArgs {
    a: i64,
    b: i64,
}

fn decode<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolFault> {
    T::deserialize(args).map_err(|e| ToolFault::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
