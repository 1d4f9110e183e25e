//! Resolves git conflict blocks left in the context after a pull or merge.

use std::collections::HashSet;
use std::fmt;

use crate::error::Result;
use crate::store::ContextStore;
use crate::vcs::Vcs;

const START_MARKER: &str = "<<<<<<<";
const SEPARATOR: &str = "=======";
const END_MARKER: &str = ">>>>>>>";

/// How the two sides of a conflict block are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Ours, then every line of theirs not already kept (exact match).
    AppendOnly,
    /// Ours only.
    PreferOurs,
    /// Ours and theirs separated by a visible marker.
    KeepBoth,
}

impl Strategy {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("memory/") || path.starts_with("archive/") {
            Self::AppendOnly
        } else if path == "config.yaml" {
            Self::PreferOurs
        } else {
            Self::KeepBoth
        }
    }

    fn combine(&self, ours: Vec<&str>, theirs: Vec<&str>) -> Vec<String> {
        match self {
            Self::AppendOnly => {
                let mut kept: HashSet<&str> = ours.iter().copied().collect();
                let mut merged: Vec<String> = ours.iter().map(|l| l.to_string()).collect();
                for line in theirs {
                    if kept.insert(line) {
                        merged.push(line.to_string());
                    }
                }
                merged
            }
            Self::PreferOurs => ours.into_iter().map(str::to_string).collect(),
            Self::KeepBoth => {
                let mut merged: Vec<String> = ours.into_iter().map(str::to_string).collect();
                merged.extend(["", "--- merged ---", ""].map(str::to_string));
                merged.extend(theirs.into_iter().map(str::to_string));
                merged
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AppendOnly => "append-only (merge both, deduplicate)",
            Self::PreferOurs => "prefer-ours (keep local config)",
            Self::KeepBoth => "keep-both (concatenate)",
        };
        f.write_str(label)
    }
}

enum Side<'a> {
    Outside,
    Ours {
        start: &'a str,
        ours: Vec<&'a str>,
    },
    Theirs {
        start: &'a str,
        ours: Vec<&'a str>,
        separator: &'a str,
        theirs: Vec<&'a str>,
    },
}

/// Result of resolving one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub content: String,
    /// Well-formed conflict blocks that were resolved.
    pub blocks: usize,
}

/// Resolve every well-formed conflict block in `content`, in document order.
///
/// Lines outside blocks are untouched. A block missing its separator or end
/// marker is written back exactly as found.
pub fn resolve_content(content: &str, strategy: Strategy) -> Resolution {
    let mut out: Vec<String> = Vec::new();
    let mut blocks = 0;
    let mut side = Side::Outside;

    for line in content.split('\n') {
        side = match side {
            Side::Outside if line.starts_with(START_MARKER) => Side::Ours {
                start: line,
                ours: Vec::new(),
            },
            Side::Outside => {
                out.push(line.to_string());
                Side::Outside
            }
            Side::Ours { start, ours } if line == SEPARATOR => Side::Theirs {
                start,
                ours,
                separator: line,
                theirs: Vec::new(),
            },
            Side::Ours { start, mut ours } => {
                ours.push(line);
                Side::Ours { start, ours }
            }
            Side::Theirs { ours, theirs, .. } if line.starts_with(END_MARKER) => {
                out.extend(strategy.combine(ours, theirs));
                blocks += 1;
                Side::Outside
            }
            Side::Theirs {
                start,
                ours,
                separator,
                mut theirs,
            } => {
                theirs.push(line);
                Side::Theirs {
                    start,
                    ours,
                    separator,
                    theirs,
                }
            }
        };
    }

    // Unterminated block: flush it back raw.
    match side {
        Side::Outside => {}
        Side::Ours { start, ours } => {
            out.push(start.to_string());
            out.extend(ours.into_iter().map(str::to_string));
        }
        Side::Theirs {
            start,
            ours,
            separator,
            theirs,
        } => {
            out.push(start.to_string());
            out.extend(ours.into_iter().map(str::to_string));
            out.push(separator.to_string());
            out.extend(theirs.into_iter().map(str::to_string));
        }
    }

    Resolution {
        content: out.join("\n"),
        blocks,
    }
}

/// True when `content` holds at least one complete conflict block.
pub fn is_conflicted(content: &str) -> bool {
    resolve_content(content, Strategy::PreferOurs).blocks > 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedFile {
    pub path: String,
    pub strategy: Strategy,
    pub blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolveReport {
    pub files: Vec<ConflictedFile>,
    pub commit: Option<String>,
}

/// Resolve every conflicted file in the context and commit once.
///
/// With `dry_run` the files are only reported. No conflicts is a successful
/// no-op.
pub fn resolve_all(store: &ContextStore, vcs: &dyn Vcs, dry_run: bool) -> Result<ResolveReport> {
    let mut report = ResolveReport::default();

    for path in store.walk(None)? {
        let content = match store.read(&path) {
            Ok(Some(content)) => content,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path, e);
                continue;
            }
        };
        let strategy = Strategy::for_path(&path);
        let resolution = resolve_content(&content, strategy);
        if resolution.blocks == 0 {
            continue;
        }

        tracing::debug!("{}: {} blocks, {}", path, resolution.blocks, strategy);
        if !dry_run {
            store.write(&path, &resolution.content)?;
        }
        report.files.push(ConflictedFile {
            path,
            strategy,
            blocks: resolution.blocks,
        });
    }

    if !dry_run && !report.files.is_empty() {
        let n = report.files.len();
        let plural = if n > 1 { "s" } else { "" };
        report.commit = vcs.commit(&format!("resolve: auto-resolved {n} conflict{plural}"))?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conflict(ours: &str, theirs: &str) -> String {
        format!("<<<<<<< HEAD\n{ours}\n=======\n{theirs}\n>>>>>>> branch-b")
    }

    #[test]
    fn append_only_collapses_exact_duplicates() {
        let content = format!(
            "# Patterns\n{}\n",
            conflict(
                "- [2026-01-01] Same entry\n- [2026-01-02] Only ours",
                "- [2026-01-01] Same entry\n- [2026-01-03] Only theirs"
            )
        );
        let resolved = resolve_content(&content, Strategy::AppendOnly);
        assert_eq!(resolved.blocks, 1);
        assert_eq!(
            resolved.content,
            "# Patterns\n- [2026-01-01] Same entry\n- [2026-01-02] Only ours\n- [2026-01-03] Only theirs\n"
        );
    }

    #[test]
    fn append_only_keeps_whitespace_variants() {
        let content = conflict("- [2026-01-01] entry", "- [2026-01-01] entry ");
        let resolved = resolve_content(&content, Strategy::AppendOnly);
        assert_eq!(resolved.content, "- [2026-01-01] entry\n- [2026-01-01] entry ");
    }

    #[test]
    fn prefer_ours_drops_theirs() {
        let content = format!("a: 1\n{}\n", conflict("branch: main", "branch: other"));
        let resolved = resolve_content(&content, Strategy::PreferOurs);
        assert_eq!(resolved.content, "a: 1\nbranch: main\n");
    }

    #[test]
    fn keep_both_inserts_separator() {
        let resolved = resolve_content(&conflict("ours", "theirs"), Strategy::KeepBoth);
        assert_eq!(resolved.content, "ours\n\n--- merged ---\n\ntheirs");
    }

    #[test]
    fn blocks_resolve_independently() {
        let content = format!("{}\nmiddle\n{}\n", conflict("a", "b"), conflict("c", "a"));
        let resolved = resolve_content(&content, Strategy::AppendOnly);
        assert_eq!(resolved.blocks, 2);
        assert_eq!(resolved.content, "a\nb\nmiddle\nc\na\n");
    }

    #[test]
    fn stray_markers_are_not_conflicts() {
        assert!(!is_conflicted("text with <<<<<<< inside\n=======\n"));
        assert!(!is_conflicted("<<<<<<< HEAD\nonly ours\n"));
        let unterminated = "<<<<<<< HEAD\nours\n=======\ntheirs\n";
        let resolved = resolve_content(unterminated, Strategy::AppendOnly);
        assert_eq!(resolved.blocks, 0);
        assert_eq!(resolved.content, unterminated);
    }

    #[test]
    fn strategy_dispatch() {
        assert_eq!(Strategy::for_path("memory/decisions.md"), Strategy::AppendOnly);
        assert_eq!(Strategy::for_path("archive/compact-2026-01-01/memory/notes.md"), Strategy::AppendOnly);
        assert_eq!(Strategy::for_path("config.yaml"), Strategy::PreferOurs);
        assert_eq!(Strategy::for_path("system/project.md"), Strategy::KeepBoth);
    }
}
