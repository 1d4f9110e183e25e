//! Branch namespace.
//!
//! A branch is a sparse overlay: `branches/<name>/memory/` only holds files
//! actually written while the branch was active. Nothing is copied from main
//! when a branch is created, and a file missing on the branch never counts as
//! a deletion.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{self, Config};
use crate::error::{MemError, Result};
use crate::models::{default_header, Category, Entry, Timestamp};
use crate::store::ContextStore;

pub const DEFAULT_BRANCH: &str = "main";

const METADATA_FILES: [&str; 3] = ["purpose.md", "commits.md", "trace.md"];

/// Path that `base` refers to while `branch` is active.
///
/// Only `memory/` paths are branch-scoped.
pub fn resolve_target(base: &str, branch: &str) -> String {
    if branch == DEFAULT_BRANCH || branch.is_empty() {
        return base.to_string();
    }
    match base.strip_prefix("memory/") {
        Some(rest) => format!("branches/{branch}/memory/{rest}"),
        None => base.to_string(),
    }
}

fn branch_dir(name: &str) -> String {
    format!("branches/{name}")
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(MemError::InvalidPath(format!("branches/{name}")));
    }
    Ok(())
}

pub fn exists(store: &ContextStore, name: &str) -> Result<bool> {
    if name == DEFAULT_BRANCH {
        return Ok(true);
    }
    validate_name(name)?;
    store.is_dir(&branch_dir(name))
}

fn require(store: &ContextStore, name: &str) -> Result<()> {
    if name == DEFAULT_BRANCH || !exists(store, name)? {
        return Err(MemError::NotFound(format!("Branch \"{name}\"")));
    }
    Ok(())
}

// ============================================================
// Lifecycle
// ============================================================

/// Create a branch and make it active.
pub fn create(store: &ContextStore, name: &str, purpose: &str, today: NaiveDate) -> Result<()> {
    validate_name(name)?;
    if name == DEFAULT_BRANCH || store.is_dir(&branch_dir(name))? {
        return Err(MemError::Conflict(format!("Branch \"{name}\" already exists")));
    }

    let dir = branch_dir(name);
    let purpose = if purpose.trim().is_empty() {
        "Purpose not specified."
    } else {
        purpose.trim()
    };
    store.write(
        &format!("{dir}/purpose.md"),
        &format!("# Branch: {name}\n\n{purpose}\n\nCreated: {}\n", today.format("%Y-%m-%d")),
    )?;
    store.write(
        &format!("{dir}/commits.md"),
        &format!("# Commits: {name}\n\nMilestone log for this branch.\n"),
    )?;
    store.write(
        &format!("{dir}/trace.md"),
        &format!("# Trace: {name}\n\nFine-grained execution log.\n"),
    )?;

    config::set_active_branch(store, name)?;
    tracing::info!("Created branch {}", name);
    Ok(())
}

/// Make `name` the active branch, returning the previous one.
pub fn switch_to(store: &ContextStore, name: &str) -> Result<String> {
    if name != DEFAULT_BRANCH {
        require(store, name)?;
    }
    let previous = Config::load(store)?.branch;
    config::set_active_branch(store, name)?;
    Ok(previous)
}

/// What a merge wrote into main.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Main-line files that received entries, with the count appended to each.
    pub files: Vec<(String, usize)>,
}

impl MergeOutcome {
    pub fn entries_merged(&self) -> usize {
        self.files.iter().map(|(_, n)| n).sum()
    }
}

/// Fold a branch back into main.
///
/// Writes a merge record to `memory/decisions.md`, then appends every branch
/// entry whose first line is not already present in the matching main file.
/// The branch directory is kept.
pub fn merge_back(
    store: &ContextStore,
    name: &str,
    summary: &str,
    now: NaiveDateTime,
) -> Result<MergeOutcome> {
    require(store, name)?;
    let dir = branch_dir(name);

    let purpose = store
        .read(&format!("{dir}/purpose.md"))?
        .map(|p| purpose_line(&p))
        .unwrap_or_default();
    let milestones: Vec<String> = store
        .read(&format!("{dir}/commits.md"))?
        .unwrap_or_default()
        .lines()
        .filter(|l| l.starts_with("- "))
        .take(10)
        .map(|l| format!("  {l}"))
        .collect();

    let mut body = vec![format!("**Purpose:** {purpose}")];
    if !summary.trim().is_empty() {
        body.push(format!("**Summary:** {}", summary.trim()));
    }
    if milestones.is_empty() {
        body.push("**Commits:** none recorded".to_string());
    } else {
        body.push("**Commits:**".to_string());
        body.extend(milestones);
    }
    let record = Entry::block(
        Timestamp::from_datetime(now),
        &format!("Merged branch: {name}"),
        body,
    );
    store.append_entry(
        Category::Decision.file(),
        &record,
        &Category::Decision.default_header(),
    )?;

    let mut outcome = MergeOutcome::default();
    for branch_path in store.list_markdown(&format!("{dir}/memory"))? {
        let Some(file_name) = branch_path.rsplit('/').next() else {
            continue;
        };
        let main_path = format!("memory/{file_name}");
        let Some(branch_file) = store.load(&branch_path)? else {
            continue;
        };

        let main_content = store.read(&main_path)?.unwrap_or_default();
        let mut seen: HashSet<String> = main_content.split('\n').map(str::to_string).collect();
        let fresh: Vec<Entry> = branch_file
            .entries
            .into_iter()
            .filter(|entry| seen.insert(entry.heading().to_string()))
            .collect();
        if fresh.is_empty() {
            tracing::debug!("Nothing new in {}", branch_path);
            continue;
        }

        let header = match Category::for_path(&main_path) {
            Some(category) => category.default_header(),
            None => default_header("Merged from branches", file_name.trim_end_matches(".md")),
        };
        store.append_entries(&main_path, &fresh, &header)?;
        tracing::debug!("Merged {} entries into {}", fresh.len(), main_path);
        outcome.files.push((main_path, fresh.len()));
    }

    config::set_active_branch(store, DEFAULT_BRANCH)?;
    tracing::info!(
        "Merged branch {} ({} entries)",
        name,
        outcome.entries_merged()
    );
    Ok(outcome)
}

// ============================================================
// Inspection
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Present on the branch only.
    Added { lines: usize },
    Modified {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub change: FileChange,
}

fn unique_lines(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    text.split('\n').filter(|l| seen.insert(*l)).collect()
}

/// Compare the files written on a branch with main.
///
/// Only files that exist on the branch are considered; branch metadata is
/// excluded.
pub fn diff(store: &ContextStore, name: &str) -> Result<Vec<FileDiff>> {
    require(store, name)?;
    let prefix = format!("{}/", branch_dir(name));

    let mut diffs = Vec::new();
    for branch_path in store.walk(Some(&branch_dir(name)))? {
        let Some(rel) = branch_path.strip_prefix(&prefix) else {
            continue;
        };
        if METADATA_FILES.contains(&rel) {
            continue;
        }
        let branch_content = store.read(&branch_path)?.unwrap_or_default();

        match store.read(rel)? {
            None => diffs.push(FileDiff {
                path: rel.to_string(),
                change: FileChange::Added {
                    lines: branch_content.split('\n').count(),
                },
            }),
            Some(main_content) if main_content == branch_content => {}
            Some(main_content) => {
                let main_lines: HashSet<&str> = main_content.split('\n').collect();
                let branch_lines: HashSet<&str> = branch_content.split('\n').collect();
                let added: Vec<String> = unique_lines(&branch_content)
                    .into_iter()
                    .filter(|l| !main_lines.contains(l))
                    .map(str::to_string)
                    .collect();
                let removed: Vec<String> = unique_lines(&main_content)
                    .into_iter()
                    .filter(|l| !branch_lines.contains(l))
                    .map(str::to_string)
                    .collect();
                if !added.is_empty() || !removed.is_empty() {
                    diffs.push(FileDiff {
                        path: rel.to_string(),
                        change: FileChange::Modified { added, removed },
                    });
                }
            }
        }
    }
    Ok(diffs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub purpose: String,
    pub current: bool,
    pub merged: bool,
}

/// First descriptive line of a `purpose.md`.
fn purpose_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| {
            !l.is_empty() && !l.starts_with('#') && !l.starts_with("---") && !l.starts_with("Created:")
        })
        .unwrap_or_default()
        .to_string()
}

fn merged_names(decisions: &str) -> HashSet<String> {
    decisions
        .lines()
        .filter_map(|l| l.split_once("Merged branch: "))
        .map(|(_, name)| name.trim().to_string())
        .collect()
}

/// Every branch other than main, sorted by name.
pub fn list(store: &ContextStore) -> Result<Vec<BranchInfo>> {
    let current = Config::load(store)?.branch;
    let merged = merged_names(&store.read(Category::Decision.file())?.unwrap_or_default());

    let mut branches = Vec::new();
    for name in store.list_dirs("branches")? {
        let purpose = store
            .read(&format!("branches/{name}/purpose.md"))?
            .map(|p| purpose_line(&p))
            .unwrap_or_default();
        branches.push(BranchInfo {
            current: current == name,
            merged: merged.contains(&name),
            name,
            purpose,
        });
    }
    Ok(branches)
}
