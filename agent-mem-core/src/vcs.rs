//! Version control for the context directory.
//!
//! The context keeps its own git repository inside `.context/`; every command
//! runs with that directory as its working directory, so the enclosing project
//! repository is never touched.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{MemError, Result};

/// One commit as shown in logs and reflection prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    /// Committer date in ISO 8601 form.
    pub date: String,
}

/// Lines added and removed for one file between two revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub file: String,
    pub added: usize,
    pub removed: usize,
}

/// Snapshot operations the lifecycle components rely on.
///
/// Mutating calls surface failures as [`MemError::Vcs`]. Read queries degrade
/// to empty values so status output still works in a fresh repository.
pub trait Vcs {
    /// Stage everything and commit. `Ok(None)` when there was nothing to commit.
    fn commit(&self, message: &str) -> Result<Option<String>>;

    fn has_changes(&self) -> bool;

    /// Commits after `since`, or all commits when `since` is `None`.
    fn commit_count(&self, since: Option<&str>) -> usize;

    /// Newest first, at most `max` commits after `since`.
    fn log(&self, since: Option<&str>, max: usize) -> Result<Vec<CommitInfo>>;

    fn diff_stat(&self, since: &str) -> Result<Vec<FileStat>>;

    /// Unified diff of `path` between `since` and `HEAD`.
    fn diff_text(&self, since: &str, path: &str) -> Result<String>;

    fn first_commit(&self) -> Option<CommitInfo>;

    fn last_commit(&self) -> Option<CommitInfo>;
}

/// Hash, date, then subject last so a subject may contain anything.
const LOG_FORMAT: &str = "--format=%h%x1f%cI%x1f%s";

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: context_dir.into(),
        }
    }

    /// Create the repository inside the context directory if it has none.
    pub fn init(context_dir: &Path) -> Result<Self> {
        let git = Self::new(context_dir);
        if !context_dir.join(".git").exists() {
            git.run(&["init", "--quiet"])?;
            tracing::info!("Initialised git repository in {}", context_dir.display());
        }
        Ok(git)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| MemError::Vcs {
                command: args.join(" "),
                stderr: e.to_string(),
            })
    }

    /// Run a command and return trimmed stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MemError::Vcs {
                command: args.join(" "),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn range(since: Option<&str>) -> String {
        match since {
            Some(rev) => format!("{rev}..HEAD"),
            None => "HEAD".to_string(),
        }
    }
}

fn parse_log_line(line: &str) -> Option<CommitInfo> {
    let mut parts = line.splitn(3, '\x1f');
    let hash = parts.next()?.to_string();
    let date = parts.next()?.to_string();
    let message = parts.next().unwrap_or_default().to_string();
    if hash.is_empty() {
        return None;
    }
    Some(CommitInfo {
        hash,
        message,
        date,
    })
}

/// Parse `git diff --numstat` output. Binary files report `-` and count as zero.
pub fn parse_numstat(output: &str) -> Vec<FileStat> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let added = parts.next()?.parse().unwrap_or(0);
            let removed = parts.next()?.parse().unwrap_or(0);
            let file = parts.next()?.to_string();
            Some(FileStat {
                file,
                added,
                removed,
            })
        })
        .collect()
}

impl Vcs for Git {
    fn commit(&self, message: &str) -> Result<Option<String>> {
        self.run(&["add", "-A"])?;

        // `diff --cached --quiet` exits 0 when nothing is staged
        let staged = self.output(&["diff", "--cached", "--quiet"])?;
        if staged.status.success() {
            return Ok(None);
        }

        self.run(&["commit", "--quiet", "-m", message])?;
        let hash = self.run(&["rev-parse", "--short", "HEAD"])?;
        tracing::info!("Committed {}: {}", hash, message);
        Ok(Some(hash))
    }

    fn has_changes(&self) -> bool {
        self.run(&["status", "--porcelain"])
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    fn commit_count(&self, since: Option<&str>) -> usize {
        let range = Self::range(since);
        self.run(&["rev-list", "--count", &range])
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    fn log(&self, since: Option<&str>, max: usize) -> Result<Vec<CommitInfo>> {
        let range = Self::range(since);
        let max = format!("-{max}");
        let out = self.run(&["log", &max, LOG_FORMAT, &range])?;
        Ok(out.lines().filter_map(parse_log_line).collect())
    }

    fn diff_stat(&self, since: &str) -> Result<Vec<FileStat>> {
        let out = self.run(&["diff", "--numstat", since, "HEAD"])?;
        Ok(parse_numstat(&out))
    }

    fn diff_text(&self, since: &str, path: &str) -> Result<String> {
        self.run(&["diff", since, "HEAD", "--", path])
    }

    fn first_commit(&self) -> Option<CommitInfo> {
        let out = self.run(&["rev-list", "--max-parents=0", "HEAD"]).ok()?;
        let root = out.lines().last()?.to_string();
        let line = self.run(&["log", "-1", LOG_FORMAT, &root]).ok()?;
        parse_log_line(&line)
    }

    fn last_commit(&self) -> Option<CommitInfo> {
        let line = self.run(&["log", "-1", LOG_FORMAT]).ok()?;
        parse_log_line(&line)
    }
}
