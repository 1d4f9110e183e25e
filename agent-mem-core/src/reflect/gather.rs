use chrono::{DateTime, Utc};

use super::{frontmatter_value, read_state, reflection_files, section_lines, write_state};
use crate::branch;
use crate::error::Result;
use crate::models::{strip_frontmatter, MemoryFile, ReflectionState};
use crate::store::ContextStore;
use crate::vcs::Vcs;

/// Commits listed individually in the prompt.
const MAX_LISTED_COMMITS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherOptions {
    /// Explicit window start, overriding the breadcrumb.
    pub since: Option<String>,
    /// Include full memory diffs since the window start.
    pub deep: bool,
    /// Add compaction-focused guidance.
    pub compaction: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gathered {
    /// Nothing happened since `since`; nothing was written.
    Empty { since: Option<String> },
    Prompt {
        prompt: String,
        state: ReflectionState,
    },
}

/// Where the reflection window starts.
///
/// Explicit override, then the breadcrumb's commit, then the newest
/// reflection file's recorded commit, then the first commit.
pub fn resolve_since(
    store: &ContextStore,
    vcs: &dyn Vcs,
    explicit: Option<&str>,
) -> Result<Option<String>> {
    if let Some(since) = explicit {
        return Ok(Some(since.to_string()));
    }
    if let Some(hash) = read_state(store).and_then(|s| s.last_commit_hash) {
        return Ok(Some(hash));
    }
    if let Some(latest) = reflection_files(store)?.last() {
        let hash = store
            .read(latest)?
            .and_then(|text| frontmatter_value(&text, "last_commit_hash"))
            .filter(|h| !h.is_empty() && h != "null");
        if hash.is_some() {
            return Ok(hash);
        }
    }
    Ok(vcs.first_commit().map(|c| c.hash))
}

struct LastReflection {
    file: String,
    date: String,
    summary: Option<String>,
}

fn last_reflection(store: &ContextStore) -> Result<Option<LastReflection>> {
    let Some(file) = reflection_files(store)?.pop() else {
        return Ok(None);
    };
    let text = store.read(&file)?.unwrap_or_default();
    let summary = section_lines(strip_frontmatter(&text), "Summary")
        .join("\n")
        .trim()
        .to_string();
    let date = frontmatter_value(&text, "date").unwrap_or_else(|| {
        file.trim_start_matches("reflections/")
            .trim_end_matches(".md")
            .to_string()
    });
    Ok(Some(LastReflection {
        file,
        date,
        summary: (!summary.is_empty()).then_some(summary),
    }))
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    }
}

/// Assemble the reflection prompt and record the breadcrumb.
///
/// The breadcrumb is written before the prompt is returned, so the next
/// gather starts after this window even if save is never called.
pub fn gather(
    store: &ContextStore,
    vcs: &dyn Vcs,
    options: &GatherOptions,
    now: DateTime<Utc>,
) -> Result<Gathered> {
    let since = resolve_since(store, vcs, options.since.as_deref())?;
    let total = vcs.commit_count(since.as_deref());
    if total == 0 {
        tracing::debug!("No commits since {:?}", since);
        return Ok(Gathered::Empty { since });
    }

    let commits = vcs.log(since.as_deref(), MAX_LISTED_COMMITS)?;
    let stats = match &since {
        Some(rev) => vcs.diff_stat(rev)?,
        None => Vec::new(),
    };
    let window_end = now.format("%Y-%m-%d").to_string();
    let window_start = commits
        .last()
        .map(|c| c.date.chars().take(10).collect::<String>())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let state = ReflectionState {
        window_start: window_start.clone(),
        window_end: window_end.clone(),
        commits_reviewed: total,
        last_commit_hash: vcs.last_commit().map(|c| c.hash),
        since_ref: since.clone(),
        gathered_at: now,
        saved_at: None,
        reflection_file: None,
    };
    write_state(store, &state)?;

    let last = last_reflection(store)?;
    let mut lines: Vec<String> = Vec::new();

    lines.push("🔍 REFLECTION INPUT".to_string());
    lines.push(format!("Window: {window_start} → {window_end} ({total} commits)"));
    lines.push(match &last {
        Some(r) => format!("Last reflection: {} ({})", r.date, r.file),
        None => "Last reflection: none (first reflection)".to_string(),
    });
    lines.push(String::new());

    lines.push("═══ RECENT ACTIVITY ═══".to_string());
    lines.push(String::new());
    lines.push(format!("COMMITS ({total}):"));
    for (i, c) in commits.iter().enumerate() {
        let date: String = c.date.chars().take(16).collect();
        lines.push(format!("  {}. {} | {} | {}", i + 1, c.hash, c.message, date));
    }
    if total > MAX_LISTED_COMMITS {
        lines.push(format!("  ... and {} earlier commits", total - MAX_LISTED_COMMITS));
    }
    lines.push(String::new());

    if !stats.is_empty() {
        lines.push("FILES CHANGED:".to_string());
        for s in &stats {
            lines.push(format!("  {}  +{} -{} lines", s.file, s.added, s.removed));
        }
        lines.push(String::new());
    }

    if options.deep {
        if let Some(rev) = &since {
            let diff = vcs.diff_text(rev, "memory/")?;
            if !diff.is_empty() {
                lines.push("MEMORY DIFFS (--deep):".to_string());
                lines.push(diff);
                lines.push(String::new());
            }
        }
    }

    let branches = branch::list(store)?;
    if !branches.is_empty() {
        lines.push("BRANCHES:".to_string());
        for b in branches.iter().filter(|b| b.merged) {
            lines.push(format!("  MERGED: {} → \"{}\"", b.name, b.purpose));
        }
        for b in branches.iter().filter(|b| !b.merged) {
            let current = if b.current { " *" } else { "" };
            lines.push(format!("  ACTIVE: {}{} → \"{}\"", b.name, current, b.purpose));
        }
        lines.push(String::new());
    }

    lines.push("═══ CURRENT MEMORY STATE ═══".to_string());
    lines.push(String::new());
    let memory = store.list_markdown("memory")?;
    if memory.is_empty() {
        lines.push("(no memory files yet)".to_string());
        lines.push(String::new());
    }
    for path in memory {
        let content = store.read(&path)?.unwrap_or_default();
        let file = MemoryFile::parse(path.as_str(), &content);
        lines.push(format!(
            "{} ({} entries, {}):",
            path,
            file.entries.len(),
            format_size(content.len())
        ));
        if file.entries.is_empty() {
            lines.push("  (empty)".to_string());
        }
        for entry in &file.entries {
            lines.push(format!("  {}", entry.heading()));
        }
        lines.push(String::new());
    }

    lines.push("═══ LAST REFLECTION ═══".to_string());
    lines.push(String::new());
    match &last {
        Some(r) => {
            lines.push(format!("(from {})", r.file));
            lines.push(r.summary.clone().unwrap_or_else(|| "(no summary)".to_string()));
        }
        None => {
            lines.extend(
                [
                    "First reflection, no prior context.",
                    "",
                    "This is your first reflection for this project. Focus on:",
                    "1. Are the memory entries so far capturing the RIGHT things?",
                    "2. Are any decisions already outdated?",
                    "3. What implicit knowledge about this project have you NOT written down?",
                    "4. Are the system/ files (conventions, project overview) still accurate?",
                ]
                .map(str::to_string),
            );
        }
    }
    lines.push(String::new());

    if options.compaction {
        lines.extend(
            [
                "═══ COMPACTION MODE ═══",
                "Your context window is filling up. Focus on:",
                "1. Summarize work into concise status (not deep analysis)",
                "2. Identify memory entries to archive",
                "3. Identify system/ files to shorten or unpin",
                "4. After saving, consider unpinning less critical system files",
                "",
            ]
            .map(str::to_string),
        );
    }

    lines.extend(
        [
            "═══ REFLECTION QUESTIONS ═══",
            "",
            "1. PATTERNS: What recurring approaches or successful strategies emerged?",
            "2. CONTRADICTIONS: Do any new entries conflict with existing ones?",
            "3. CONSOLIDATION: Can entries be merged, clarified, or made more specific?",
            "4. GAPS: What important context is NOT yet captured?",
            "5. THEMES: What overarching directions are emerging?",
            "6. STALE: Are any existing entries outdated?",
            "",
            "═══ INSTRUCTIONS ═══",
            "",
            "After reasoning, call:",
            "  amem reflect save --content \"YOUR_REFLECTION\"",
            "",
            "Use this format:",
            "",
            "## Patterns Identified",
            "- <pattern>",
            "",
            "## Decisions Validated",
            "- <decision confirmed by recent work>",
            "",
            "## Contradictions Found",
            "- <what conflicts, and resolution>",
            "",
            "## Stale Entries",
            "- <file>: <entry to flag>",
            "",
            "## Gaps Filled",
            "- type: decision|pattern|mistake|note",
            "  text: <new entry to add>",
            "",
            "## Lessons Learned",
            "- text: <short title>",
            "  problem: <what went wrong>",
            "  resolution: <what fixed it>",
            "",
            "## Themes",
            "- <overarching theme>",
            "",
            "## Summary",
            "<2-3 sentence summary>",
        ]
        .map(str::to_string),
    );

    tracing::info!("Gathered reflection window {} -> {}", window_start, window_end);
    Ok(Gathered::Prompt {
        prompt: lines.join("\n"),
        state,
    })
}
