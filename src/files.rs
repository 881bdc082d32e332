//! UTF-8 text file access relative to the working root.
//!
//! Paths are joined onto the working root. Absolute paths and `..` are
//! honoured as given unless the path jail is enabled, in which case anything
//! that resolves outside the root (symlinks included) is refused.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::GateConfig;

/// A file operation that did not succeed.
///
/// The `Display` text is what the agent sees.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Error reading {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("Error writing {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("Error: {path} resolves outside the working root")]
    OutsideRoot { path: String },
    #[error("Error: cannot resolve {path}: {source}")]
    Resolve { path: String, source: io::Error },
}

/// Confirmation of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Length of the written content in bytes.
    pub bytes: usize,
    /// Where the content was written.
    pub path: PathBuf,
}

impl fmt::Display for WriteReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wrote {} bytes to {}", self.bytes, self.path.display())
    }
}

/// Reads and writes text files under a working root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    jail: bool,
}

impl Workspace {
    /// Creates a workspace for the configured working root and path jail.
    pub fn new(config: &Arc<GateConfig>) -> Self {
        Self {
            root: config.working_root().to_path_buf(),
            jail: config.path_jail(),
        }
    }

    /// The working root, as configured.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` against the working root, enforcing the jail if enabled.
    pub async fn resolve(&self, path: &str) -> Result<PathBuf, FileError> {
        if !self.jail {
            return Ok(self.root.join(path));
        }

        let resolve_err = |source| FileError::Resolve {
            path: path.to_owned(),
            source,
        };
        let root = tokio::fs::canonicalize(&self.root).await.map_err(resolve_err)?;
        let real = canonicalize_existing(&normalize(&root.join(path)))
            .await
            .map_err(resolve_err)?;

        if real.starts_with(&root) {
            Ok(real)
        } else {
            debug!(path, resolved = %real.display(), "path escapes working root");
            Err(FileError::OutsideRoot {
                path: path.to_owned(),
            })
        }
    }

    /// Writes `content` to `path`, replacing any previous content and creating
    /// missing parent directories.
    pub async fn write(&self, path: &str, content: &str) -> Result<WriteReceipt, FileError> {
        let target = self.resolve(path).await?;
        let write_err = |source| FileError::Write {
            path: path.to_owned(),
            source,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&target, content.as_bytes())
            .await
            .map_err(write_err)?;

        info!(path = %target.display(), bytes = content.len(), "wrote file");
        Ok(WriteReceipt {
            bytes: content.len(),
            path: target,
        })
    }

    /// Reads `path` as UTF-8 text.
    pub async fn read(&self, path: &str) -> Result<String, FileError> {
        let target = self.resolve(path).await?;
        let content = tokio::fs::read_to_string(&target)
            .await
            .map_err(|source| FileError::Read {
                path: path.to_owned(),
                source,
            })?;
        debug!(path = %target.display(), bytes = content.len(), "read file");
        Ok(content)
    }
}

/// Removes `.` and folds `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Symlinks followed before giving up, as `SYMLOOP_MAX` does.
const MAX_SYMLINK_HOPS: usize = 40;

/// Canonicalizes the deepest existing ancestor of `path` and re-appends the
/// components that do not exist yet.
///
/// A dangling symlink is not a missing component: a write through it creates
/// its target, so resolution restarts from the link's target.
async fn canonicalize_existing(path: &Path) -> io::Result<PathBuf> {
    let mut path = normalize(path);
    for _ in 0..MAX_SYMLINK_HOPS {
        let mut existing = path.as_path();
        let mut missing = Vec::new();
        let redirected = loop {
            match tokio::fs::canonicalize(existing).await {
                Ok(mut real) => {
                    real.extend(missing.iter().rev());
                    return Ok(real);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if is_symlink(existing).await {
                        let target = tokio::fs::read_link(existing).await?;
                        let target = match existing.parent() {
                            Some(parent) => parent.join(target),
                            None => target,
                        };
                        let mut redirected = normalize(&target);
                        redirected.extend(missing.iter().rev());
                        break redirected;
                    }
                    match (existing.parent(), existing.file_name()) {
                        (Some(parent), Some(name)) => {
                            missing.push(name.to_os_string());
                            existing = parent;
                        }
                        _ => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        };
        path = redirected;
    }
    Err(io::Error::other("too many levels of symbolic links"))
}

async fn is_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|meta| meta.file_type().is_symlink())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(root: &Path) -> Workspace {
        Workspace::new(&GateConfig::new(root).shared())
    }

    fn jailed(root: &Path) -> Workspace {
        Workspace::new(&GateConfig::new(root).with_path_jail(true).shared())
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        let receipt = ws.write("a/b/c.txt", "hello").await.unwrap();
        assert_eq!(receipt.bytes, 5);
        assert_eq!(receipt.path, dir.path().join("a/b/c.txt"));
        assert!(dir.path().join("a/b").is_dir());
        assert_eq!(ws.read("a/b/c.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_receipt_text() {
        let dir = tempfile::tempdir().unwrap();
        let receipt = workspace(dir.path()).write("notes.md", "hi").await.unwrap();
        assert_eq!(
            receipt.to_string(),
            format!("Wrote 2 bytes to {}", dir.path().join("notes.md").display())
        );
    }

    #[tokio::test]
    async fn test_byte_count_is_utf8_length() {
        let dir = tempfile::tempdir().unwrap();
        let receipt = workspace(dir.path()).write("u.txt", "héllo ✓").await.unwrap();
        assert_eq!(receipt.bytes, "héllo ✓".len());
        assert_eq!(receipt.bytes, 10);
    }

    #[tokio::test]
    async fn test_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let samples = ["", "\n", "  padded  \n\n", "line1\r\nline2", "tabs\tand ünïcödé 🚀", "no newline"];

        for (i, content) in samples.iter().enumerate() {
            let path = format!("round/{i}.txt");
            ws.write(&path, content).await.unwrap();
            assert_eq!(ws.read(&path).await.unwrap(), *content);
        }
    }

    #[tokio::test]
    async fn test_write_overwrites_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        ws.write("f.txt", "a much longer first version").await.unwrap();
        ws.write("f.txt", "short").await.unwrap();
        assert_eq!(ws.read("f.txt").await.unwrap(), "short");
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        let first = ws.write("f.txt", "same").await.unwrap();
        let second = ws.write("f.txt", "same").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ws.read("f.txt").await.unwrap(), "same");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = workspace(dir.path()).read("missing/file.txt").await.unwrap_err();
        assert!(matches!(err, FileError::Read { .. }));
        let text = err.to_string();
        assert!(text.starts_with("Error reading missing/file.txt: "), "{text}");
    }

    #[tokio::test]
    async fn test_read_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0xff, 0xfe, 0x00]).unwrap();
        let err = workspace(dir.path()).read("bin.dat").await.unwrap_err();
        assert!(matches!(err, FileError::Read { .. }));
        assert!(err.to_string().contains("bin.dat"));
    }

    #[tokio::test]
    async fn test_read_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        assert!(workspace(dir.path()).read("sub").await.is_err());
    }

    #[tokio::test]
    async fn test_write_into_file_as_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.write("plain", "x").await.unwrap();
        let err = ws.write("plain/child.txt", "y").await.unwrap_err();
        assert!(matches!(err, FileError::Write { .. }));
    }

    #[tokio::test]
    async fn test_unjailed_paths_are_honoured() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let ws = workspace(&root.path().join("inner"));

        let absolute = elsewhere.path().join("abs.txt");
        ws.write(absolute.to_str().unwrap(), "abs").await.unwrap();
        assert_eq!(std::fs::read_to_string(&absolute).unwrap(), "abs");

        ws.write("../up.txt", "up").await.unwrap();
        assert_eq!(std::fs::read_to_string(root.path().join("up.txt")).unwrap(), "up");
    }

    #[tokio::test]
    async fn test_jail_allows_paths_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = jailed(dir.path());

        ws.write("new/deep/dir/f.txt", "ok").await.unwrap();
        assert_eq!(ws.read("new/./deep/../deep/dir/f.txt").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_jail_refuses_traversal_and_absolute_paths() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let ws = jailed(root.path());

        let err = ws.write("../escape.txt", "x").await.unwrap_err();
        assert!(matches!(err, FileError::OutsideRoot { .. }));
        assert_eq!(err.to_string(), "Error: ../escape.txt resolves outside the working root");

        let absolute = elsewhere.path().join("abs.txt");
        let err = ws.read(absolute.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, FileError::OutsideRoot { .. }));
        assert!(!absolute.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_jail_refuses_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), root.path().join("link")).unwrap();

        let err = jailed(root.path()).write("link/x.txt", "x").await.unwrap_err();
        assert!(matches!(err, FileError::OutsideRoot { .. }));
        assert!(!elsewhere.path().join("x.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_jail_refuses_dangling_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("escaped.txt");
        std::os::unix::fs::symlink(&target, root.path().join("evil")).unwrap();

        let ws = jailed(root.path());
        let err = ws.write("evil", "pwned").await.unwrap_err();
        assert!(matches!(err, FileError::OutsideRoot { .. }));
        assert!(!target.exists());

        // Missing components below a dangling directory link are caught too.
        std::os::unix::fs::symlink(elsewhere.path().join("gone"), root.path().join("dir")).unwrap();
        let err = ws.write("dir/a/b.txt", "x").await.unwrap_err();
        assert!(matches!(err, FileError::OutsideRoot { .. }));
        assert!(!elsewhere.path().join("gone").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_jail_follows_dangling_symlink_inside_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("data")).unwrap();
        std::os::unix::fs::symlink("data/new.txt", root.path().join("link")).unwrap();

        let ws = jailed(root.path());
        let receipt = ws.write("link", "inside").await.unwrap();
        let real_root = std::fs::canonicalize(root.path()).unwrap();
        assert_eq!(receipt.path, real_root.join("data/new.txt"));
        assert_eq!(std::fs::read_to_string(root.path().join("data/new.txt")).unwrap(), "inside");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_jail_reports_symlink_loop() {
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("b", root.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", root.path().join("b")).unwrap();

        let err = jailed(root.path()).write("a", "x").await.unwrap_err();
        assert!(matches!(err, FileError::Resolve { .. }));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
