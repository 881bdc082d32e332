use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::GateConfig;
use crate::shell::{self, ParseError};

/// The policy engine's classification of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A denylisted command name was found; the command must never run.
    Blocked {
        /// The denylisted command name that triggered the block.
        token: String,
    },
    /// Nothing denylisted was found. The command may proceed to approval.
    Permitted {
        /// Set when the command could not be tokenized; the operator sees the
        /// raw string either way.
        warning: Option<String>,
    },
}

impl Verdict {
    /// Returns `true` for [`Verdict::Blocked`].
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Blocked { .. })
    }

    fn permitted() -> Self {
        Verdict::Permitted { warning: None }
    }
}

/// Classifies shell commands against the configured denylist.
///
/// Classification is a pure function of the command text and the
/// configuration.
///
/// # Example
///
/// ```
/// use hostgate::{Denylist, GateConfig, PolicyEngine, Verdict};
///
/// let config = GateConfig::new(".").with_denylist(Denylist::new(["rm", "sudo"])).shared();
/// let policy = PolicyEngine::new(config);
///
/// assert!(policy.classify("rm -rf /").is_blocked());
/// assert_eq!(policy.classify("ls -la"), Verdict::Permitted { warning: None });
/// ```
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: Arc<GateConfig>,
}

impl PolicyEngine {
    /// Creates an engine that reads the denylist from `config`.
    pub fn new(config: Arc<GateConfig>) -> Self {
        Self { config }
    }

    /// Classifies `command` as blocked or permitted.
    ///
    /// The leading token, split with shell quoting rules, is checked against
    /// the denylist. With compound inspection enabled, every command of a
    /// pipeline or list is checked as well.
    pub fn classify(&self, command: &str) -> Verdict {
        let verdict = match shell::leading_token(command) {
            Ok(Some(token)) if self.config.denylist().contains(&token) => {
                Verdict::Blocked { token }
            }
            Ok(_) => Verdict::permitted(),
            Err(e) => {
                warn!(command, error = %e, "command could not be tokenized");
                Verdict::Permitted {
                    warning: Some(e.to_string()),
                }
            }
        };

        let verdict = match verdict {
            Verdict::Permitted { .. } if self.config.inspect_compound() => {
                self.inspect_compound(command).unwrap_or(verdict)
            }
            other => other,
        };

        debug!(command, ?verdict, "classified command");
        verdict
    }

    /// Looks for a denylisted name anywhere in a compound command.
    fn inspect_compound(&self, command: &str) -> Option<Verdict> {
        let commands = match shell::simple_commands(command) {
            Ok(commands) => commands,
            Err(ParseError::Empty) => return None,
            Err(e) => {
                debug!(command, error = %e, "compound inspection skipped");
                return None;
            }
        };

        commands
            .into_iter()
            .find(|cmd| self.config.denylist().contains(&cmd.name))
            .map(|cmd| Verdict::Blocked { token: cmd.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denylist::Denylist;

    fn engine(names: &[&str]) -> PolicyEngine {
        let config = GateConfig::new(".").with_denylist(Denylist::new(names.iter().copied()));
        PolicyEngine::new(config.shared())
    }

    fn compound_engine(names: &[&str]) -> PolicyEngine {
        let config = GateConfig::new(".")
            .with_denylist(Denylist::new(names.iter().copied()))
            .with_compound_inspection(true);
        PolicyEngine::new(config.shared())
    }

    #[test]
    fn test_blocks_denylisted_leading_token() {
        let policy = engine(&["rm", "sudo"]);
        assert_eq!(
            policy.classify("rm -rf /"),
            Verdict::Blocked {
                token: "rm".to_string()
            }
        );
        assert!(policy.classify("sudo apt install foo").is_blocked());
    }

    #[test]
    fn test_permits_other_commands() {
        let policy = engine(&["rm", "sudo"]);
        assert_eq!(policy.classify("git status"), Verdict::permitted());
        assert_eq!(policy.classify("echo rm"), Verdict::permitted());
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let policy = engine(&["rm"]);
        assert!(!policy.classify("RM -rf /").is_blocked());
        assert!(!policy.classify("rmdir foo").is_blocked());
        assert!(!policy.classify("/bin/rm -rf /").is_blocked());
    }

    #[test]
    fn test_quoted_leading_token_is_still_blocked() {
        let policy = engine(&["rm"]);
        assert!(policy.classify("'rm' -rf /").is_blocked());
        assert!(policy.classify(r#""rm" -rf /"#).is_blocked());
    }

    #[test]
    fn test_empty_command_is_permitted() {
        let policy = engine(&["rm"]);
        assert_eq!(policy.classify(""), Verdict::permitted());
        assert_eq!(policy.classify("   "), Verdict::permitted());
    }

    #[test]
    fn test_untokenizable_command_is_permitted_with_warning() {
        let policy = engine(&["rm"]);
        match policy.classify("rm 'unterminated") {
            Verdict::Permitted { warning: Some(_) } => {}
            other => panic!("Expected permitted with warning, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_token_only_by_default() {
        let policy = engine(&["sudo"]);
        assert!(!policy.classify("make && sudo make install").is_blocked());
    }

    #[test]
    fn test_compound_inspection_blocks_later_commands() {
        let policy = compound_engine(&["sudo", "rm"]);
        assert_eq!(
            policy.classify("make && sudo make install"),
            Verdict::Blocked {
                token: "sudo".to_string()
            }
        );
        // `rm` here is an argument, not a command name.
        assert!(!policy.classify("ls | xargs rm").is_blocked());
        assert!(policy.classify("cd out; rm -rf build").is_blocked());
        assert!(!policy.classify("cargo build | tee log.txt").is_blocked());
    }

    #[test]
    fn test_compound_inspection_skips_subshells() {
        let policy = compound_engine(&["rm"]);
        // Subshells are not inspected; the leading token decides.
        assert!(!policy.classify("(cd /tmp && rm -rf x)").is_blocked());
        assert!(policy.classify("rm -rf x").is_blocked());
    }

    #[test]
    fn test_trailing_subshell_does_not_hide_denied_command() {
        let policy = compound_engine(&["sudo"]);
        let blocked = Verdict::Blocked {
            token: "sudo".to_string(),
        };
        assert_eq!(policy.classify("make && sudo make install; (true)"), blocked);
        assert_eq!(policy.classify("a && sudo b; (c)"), blocked);
        assert_eq!(policy.classify("if true; then :; fi; sudo reboot"), blocked);
    }
}
