use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::denylist::Denylist;

/// Settings read by every stage of the gate.
///
/// A `GateConfig` is built once at startup and then shared read-only (see
/// [`GateConfig::shared`]); nothing in the crate mutates it afterwards.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hostgate::{Denylist, GateConfig};
///
/// let config = GateConfig::new("/tmp/project")
///     .with_denylist(Denylist::new(["rm", "sudo"]))
///     .with_approval_required(false)
///     .with_exec_timeout(Duration::from_secs(30));
///
/// assert!(!config.approval_required());
/// assert!(config.denylist().contains("sudo"));
/// ```
#[derive(Debug, Clone)]
pub struct GateConfig {
    working_root: PathBuf,
    denylist: Denylist,
    approval_required: bool,
    approval_timeout: Option<Duration>,
    exec_timeout: Option<Duration>,
    path_jail: bool,
    inspect_compound: bool,
}

impl GateConfig {
    /// Creates a configuration rooted at `working_root` with the default
    /// denylist, approval required, no timeouts, no path jail, and
    /// leading-token classification only.
    pub fn new(working_root: impl Into<PathBuf>) -> Self {
        Self {
            working_root: working_root.into(),
            denylist: Denylist::default(),
            approval_required: true,
            approval_timeout: None,
            exec_timeout: None,
            path_jail: false,
            inspect_compound: false,
        }
    }

    /// Replaces the default denylist.
    pub fn with_denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// When `false`, every non-blocked command is approved without prompting.
    pub fn with_approval_required(mut self, required: bool) -> Self {
        self.approval_required = required;
        self
    }

    /// Bounds how long the approval prompt waits for an answer.
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = Some(timeout);
        self
    }

    /// Bounds how long an approved command may run before it is killed.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = Some(timeout);
        self
    }

    /// Refuses file paths that resolve outside the working root.
    pub fn with_path_jail(mut self, enabled: bool) -> Self {
        self.path_jail = enabled;
        self
    }

    /// Checks every command of a pipeline or `&&`/`||`/`;` list against the
    /// denylist, not just the leading token.
    pub fn with_compound_inspection(mut self, enabled: bool) -> Self {
        self.inspect_compound = enabled;
        self
    }

    /// Directory that relative paths and shell commands resolve against.
    pub fn working_root(&self) -> &Path {
        &self.working_root
    }

    /// Leading tokens that are always refused.
    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    /// Whether each non-blocked command waits for an operator's `y`.
    pub fn approval_required(&self) -> bool {
        self.approval_required
    }

    /// How long the approval prompt waits, if bounded.
    pub fn approval_timeout(&self) -> Option<Duration> {
        self.approval_timeout
    }

    /// How long an approved command may run, if bounded.
    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout
    }

    /// Whether file paths must resolve inside the working root.
    pub fn path_jail(&self) -> bool {
        self.path_jail
    }

    /// Whether every command of a pipeline or list is checked.
    pub fn inspect_compound(&self) -> bool {
        self.inspect_compound
    }

    /// Freezes this configuration for sharing between the gate's components.
    pub fn shared(self) -> Arc<GateConfig> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::new("/work");
        assert_eq!(config.working_root(), Path::new("/work"));
        assert_eq!(config.denylist(), &Denylist::default());
        assert!(config.approval_required());
        assert_eq!(config.approval_timeout(), None);
        assert_eq!(config.exec_timeout(), None);
        assert!(!config.path_jail());
        assert!(!config.inspect_compound());
    }

    #[test]
    fn test_builder() {
        let config = GateConfig::new("/work")
            .with_denylist(Denylist::new(["curl"]))
            .with_approval_required(false)
            .with_approval_timeout(Duration::from_secs(5))
            .with_exec_timeout(Duration::from_secs(10))
            .with_path_jail(true)
            .with_compound_inspection(true);

        assert!(config.denylist().contains("curl"));
        assert!(!config.denylist().contains("rm"));
        assert!(!config.approval_required());
        assert_eq!(config.approval_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.exec_timeout(), Some(Duration::from_secs(10)));
        assert!(config.path_jail());
        assert!(config.inspect_compound());
    }
}
