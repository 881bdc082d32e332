//! Human confirmation before a shell command runs.
//!
//! The gate shows the literal command text to an operator and waits for an
//! answer. Only `y` (any case, surrounding whitespace ignored) approves;
//! everything else, including an empty line or closed input, rejects.

use std::collections::VecDeque;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::GateConfig;

/// The operator's answer for a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    /// Interprets a raw response line. Only `y` or `Y` approves.
    ///
    /// ```
    /// use hostgate::ApprovalDecision;
    ///
    /// assert_eq!(ApprovalDecision::from_response(" Y\n"), ApprovalDecision::Approved);
    /// assert_eq!(ApprovalDecision::from_response("yes"), ApprovalDecision::Rejected);
    /// assert_eq!(ApprovalDecision::from_response(""), ApprovalDecision::Rejected);
    /// ```
    pub fn from_response(response: &str) -> Self {
        if response.trim().eq_ignore_ascii_case("y") {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Rejected
        }
    }
}

/// The wait for an answer ended without one.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("approval was cancelled")]
    Cancelled,
    #[error("no answer within {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("approval prompt failed: {0}")]
    Prompt(#[from] io::Error),
}

/// A source of operator answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Shows `command` verbatim and waits for one line of response.
    ///
    /// Returns `Ok(None)` when the operator's input has ended.
    async fn ask(&self, command: &str) -> io::Result<Option<String>>;
}

/// Prompts on the controlling terminal: the request goes to stderr and the
/// answer is read from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&self, command: &str) -> io::Result<Option<String>> {
        let command = command.to_owned();
        // Reading stdin blocks; keep it off the runtime's worker threads. A
        // cancelled wait leaves this thread parked on stdin until the next line.
        tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
            let rule = "=".repeat(60);
            let mut err = io::stderr().lock();
            writeln!(err)?;
            writeln!(err, "{rule}")?;
            writeln!(err, "Agent wants to run: {command}")?;
            writeln!(err, "{rule}")?;
            write!(err, "Approve? [y/N]: ")?;
            err.flush()?;

            let mut line = String::new();
            let read = io::stdin().lock().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Answers prompts from a fixed script, for tests and non-interactive hosts.
///
/// Each prompt consumes the next scripted answer; once the script runs out,
/// input is treated as closed.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Creates a prompter that gives `answers` in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// The commands shown so far, in order.
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().map(|shown| shown.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, command: &str) -> io::Result<Option<String>> {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(command.to_owned());
        }
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| io::Error::other("scripted answers poisoned"))?;
        Ok(answers.pop_front())
    }
}

/// Solicits a yes/no decision before each non-blocked command.
#[derive(Clone)]
pub struct ApprovalGate {
    config: Arc<GateConfig>,
    prompter: Arc<dyn Prompter>,
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("approval_required", &self.config.approval_required())
            .finish_non_exhaustive()
    }
}

impl ApprovalGate {
    /// Creates a gate that asks `prompter` whenever `config` requires approval.
    pub fn new(config: Arc<GateConfig>, prompter: Arc<dyn Prompter>) -> Self {
        Self { config, prompter }
    }

    /// Asks the operator whether `command` may run.
    ///
    /// Approves without prompting when approval is disabled. Otherwise every
    /// call prompts; earlier answers are never reused. The wait ends early if
    /// `cancel` fires or the configured approval timeout elapses.
    pub async fn confirm(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<ApprovalDecision, ApprovalError> {
        if !self.config.approval_required() {
            debug!(command, "approval not required");
            return Ok(ApprovalDecision::Approved);
        }
        if cancel.is_cancelled() {
            return Err(ApprovalError::Cancelled);
        }

        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApprovalError::Cancelled),
            answer = within(self.config.approval_timeout(), self.prompter.ask(command)) => answer?,
        };

        let decision = match answer {
            Some(line) => ApprovalDecision::from_response(&line),
            None => ApprovalDecision::Rejected,
        };
        info!(command, ?decision, "operator answered");
        Ok(decision)
    }
}

async fn within<F>(limit: Option<Duration>, ask: F) -> Result<Option<String>, ApprovalError>
where
    F: Future<Output = io::Result<Option<String>>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, ask)
            .await
            .map_err(|_| ApprovalError::TimedOut(limit))?
            .map_err(ApprovalError::from),
        None => ask.await.map_err(ApprovalError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never answers.
    struct SilentPrompter;

    #[async_trait]
    impl Prompter for SilentPrompter {
        async fn ask(&self, _command: &str) -> io::Result<Option<String>> {
            std::future::pending().await
        }
    }

    struct BrokenPrompter;

    #[async_trait]
    impl Prompter for BrokenPrompter {
        async fn ask(&self, _command: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"))
        }
    }

    fn gate(config: GateConfig, prompter: Arc<dyn Prompter>) -> ApprovalGate {
        ApprovalGate::new(config.shared(), prompter)
    }

    #[test]
    fn test_only_y_approves() {
        for answer in ["y", "Y", " y ", "y\n", "\tY\r\n"] {
            assert_eq!(
                ApprovalDecision::from_response(answer),
                ApprovalDecision::Approved,
                "{answer:?}"
            );
        }
        for answer in ["", "\n", "n", "N", "yes", "yy", "ok", "1", "true", " "] {
            assert_eq!(
                ApprovalDecision::from_response(answer),
                ApprovalDecision::Rejected,
                "{answer:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_prompt_shows_literal_command() {
        let prompter = Arc::new(ScriptedPrompter::new(["y"]));
        let gate = gate(GateConfig::new("."), prompter.clone());
        let command = r#"git commit -m "it's   done" | tee 'log'"#;

        let decision = gate.confirm(command, &CancellationToken::new()).await.unwrap();
        assert_eq!(decision, ApprovalDecision::Approved);
        assert_eq!(prompter.shown(), vec![command.to_string()]);
    }

    #[tokio::test]
    async fn test_every_call_prompts_again() {
        let prompter = Arc::new(ScriptedPrompter::new(["y", "n"]));
        let gate = gate(GateConfig::new("."), prompter.clone());
        let cancel = CancellationToken::new();

        assert_eq!(gate.confirm("ls", &cancel).await.unwrap(), ApprovalDecision::Approved);
        assert_eq!(gate.confirm("ls", &cancel).await.unwrap(), ApprovalDecision::Rejected);
        assert_eq!(prompter.shown().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_input_rejects() {
        let prompter = Arc::new(ScriptedPrompter::new(Vec::<String>::new()));
        let gate = gate(GateConfig::new("."), prompter);

        let decision = gate.confirm("ls", &CancellationToken::new()).await.unwrap();
        assert_eq!(decision, ApprovalDecision::Rejected);
    }

    #[tokio::test]
    async fn test_disabled_approval_does_not_prompt() {
        let prompter = Arc::new(ScriptedPrompter::new(["n"]));
        let gate = gate(GateConfig::new(".").with_approval_required(false), prompter.clone());

        let decision = gate.confirm("echo hi", &CancellationToken::new()).await.unwrap();
        assert_eq!(decision, ApprovalDecision::Approved);
        assert!(prompter.shown().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_ends_wait() {
        let gate = gate(GateConfig::new("."), Arc::new(SilentPrompter));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = gate.confirm("ls", &cancel).await;
        assert!(matches!(result, Err(ApprovalError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_prompt() {
        let prompter = Arc::new(ScriptedPrompter::new(["y"]));
        let gate = gate(GateConfig::new("."), prompter.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = gate.confirm("ls", &cancel).await;
        assert!(matches!(result, Err(ApprovalError::Cancelled)));
        assert!(prompter.shown().is_empty());
    }

    #[tokio::test]
    async fn test_approval_timeout() {
        let config = GateConfig::new(".").with_approval_timeout(Duration::from_millis(20));
        let gate = gate(config, Arc::new(SilentPrompter));

        let result = gate.confirm("ls", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ApprovalError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_prompt_failure_is_an_error() {
        let gate = gate(GateConfig::new("."), Arc::new(BrokenPrompter));

        let result = gate.confirm("ls", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ApprovalError::Prompt(_))));
    }
}
