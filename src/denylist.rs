use std::collections::BTreeSet;

/// Leading tokens refused by default: destructive and privilege-escalating verbs.
pub const DEFAULT_DENYLIST: &[&str] = &["rm", "rmdir", "sudo", "su", "chmod", "chown"];

/// A fixed set of command names that are always refused, regardless of approval.
///
/// Matching is exact and case-sensitive: `rm` is denied, `RM` and `/bin/rm` are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylist {
    entries: BTreeSet<String>,
}

impl Denylist {
    /// Creates a denylist from the given command names.
    ///
    /// # Example
    ///
    /// ```
    /// use hostgate::Denylist;
    ///
    /// let denylist = Denylist::new(["rm", "sudo"]);
    /// assert!(denylist.contains("rm"));
    /// assert!(!denylist.contains("ls"));
    /// ```
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a denylist that refuses nothing.
    pub fn empty() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }

    /// Returns `true` if `token` is exactly one of the denied names.
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains(token)
    }

    /// Iterates over the denied names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Number of denied names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is denied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}
