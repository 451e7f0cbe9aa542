//! Version metadata lookup through the `git` CLI

use std::path::{Path, PathBuf};
use std::process::Command;

/// Commit metadata for the last commit touching a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub commit_id: String,
    pub author: String,
    /// ISO-8601 author date.
    pub timestamp: String,
    pub branch: String,
}

/// Source of version metadata for ingested files.
///
/// Lookups are best-effort: `None` means "not under version control" and the
/// caller falls back to the literal `local` stamp.
pub trait VersionControl: Send + Sync {
    fn commit_info(&self, path: &Path) -> Option<CommitInfo>;
    fn previous_commit(&self, path: &Path, commit_id: &str) -> Option<String>;
}

/// [`VersionControl`] implementation shelling out to the `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    fn repo_root(&self, start_dir: &Path) -> Option<PathBuf> {
        let output = Command::new("git")
            .arg("-C")
            .arg(start_dir)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            return None;
        }
        Some(PathBuf::from(root))
    }

    fn locate(&self, path: &Path) -> Option<(PathBuf, PathBuf)> {
        let resolved = path.canonicalize().ok()?;
        let root = self.repo_root(resolved.parent()?)?;
        let rel = resolved.strip_prefix(&root).ok()?.to_path_buf();
        Some((root, rel))
    }
}

impl VersionControl for GitCli {
    fn commit_info(&self, path: &Path) -> Option<CommitInfo> {
        let (root, rel) = self.locate(path)?;

        let output = Command::new("git")
            .arg("-C")
            .arg(&root)
            .args(["log", "-1", "--format=%H%x1f%an%x1f%aI", "--"])
            .arg(&rel)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if line.is_empty() {
            return None;
        }
        let parts: Vec<&str> = line.split('\u{1f}').collect();
        let [commit_id, author, timestamp] = parts.as_slice() else {
            return None;
        };

        let branch_output = Command::new("git")
            .arg("-C")
            .arg(&root)
            .args(["branch", "--show-current"])
            .output()
            .ok();
        let branch = branch_output
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "detached".to_string());

        Some(CommitInfo {
            commit_id: commit_id.to_string(),
            author: author.to_string(),
            timestamp: timestamp.to_string(),
            branch,
        })
    }

    fn previous_commit(&self, path: &Path, commit_id: &str) -> Option<String> {
        let (root, rel) = self.locate(path)?;
        let output = Command::new("git")
            .arg("-C")
            .arg(&root)
            .args(["log", "-1", "--format=%H", &format!("{commit_id}~1"), "--"])
            .arg(&rel)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let prev = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if prev.is_empty() { None } else { Some(prev) }
    }
}
