//! Plain-text reports printed by the CLI.
//!
//! Every renderer returns a `String` so commands stay thin and the output can
//! be checked in tests without capturing stdout.

use chrono::{DateTime, Utc};

use agent_mem_core::branch::{BranchInfo, FileChange, FileDiff, DEFAULT_BRANCH};
use agent_mem_core::compact::{CompactMode, CompactReport};
use agent_mem_core::context::{Described, Snapshot, Status};
use agent_mem_core::defrag::DefragReport;
use agent_mem_core::memory::SearchHit;
use agent_mem_core::reflect::History;
use agent_mem_core::resolve::ResolveReport;

/// Search matches shown before the remainder is summarised.
pub const SEARCH_LIMIT: usize = 20;

/// Added/removed lines sampled per file in a verbose diff.
const DIFF_SAMPLE: usize = 5;

const SEARCH_PREVIEW: usize = 100;

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// "5 minutes ago" style age of an ISO 8601 commit date.
pub fn time_ago(date: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(date) else {
        return date.to_string();
    };
    let secs = (now - then.with_timezone(&Utc)).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{} ago", plural((secs / 60) as usize, "minute")),
        3600..=86_399 => format!("{} ago", plural((secs / 3600) as usize, "hour")),
        _ => format!("{} ago", plural((secs / 86_400) as usize, "day")),
    }
}

// ============================================================
// Status and snapshot
// ============================================================

fn status_header(status: &Status, now: DateTime<Utc>, lines: &mut Vec<String>) {
    let dirty = if status.dirty { " ⚠️ uncommitted changes" } else { "" };
    lines.push(format!(
        "Branch: {} | Commits: {}{}",
        status.branch, status.commits, dirty
    ));
    if let Some(last) = &status.last {
        lines.push(format!(
            "Last: \"{}\" ({})",
            last.message,
            time_ago(&last.date, now)
        ));
    }
}

fn config_line(status: &Status) -> String {
    format!(
        "auto_commit={} | reflection={}",
        status.config.auto_commit,
        status.config.reflection.trigger.as_str()
    )
}

pub fn status(status: &Status, now: DateTime<Utc>) -> String {
    let mut lines = vec![format!("📊 STATUS: {}", status.project)];
    status_header(status, now, &mut lines);
    lines.push(format!(
        "Files: {} pinned, {} memory, {} reflections",
        status.pinned, status.memory, status.reflections
    ));
    lines.push(format!("Branches: {}", status.branches));
    lines.push(format!("Config: {}", config_line(status)));
    lines.join("\n")
}

fn described(files: &[Described], lines: &mut Vec<String>) {
    for f in files {
        let name = f.path.rsplit('/').next().unwrap_or(&f.path);
        lines.push(format!(
            "  {} — {}",
            name,
            f.description.as_deref().unwrap_or("(no description)")
        ));
    }
    lines.push(String::new());
}

pub fn snapshot(snap: &Snapshot, now: DateTime<Utc>) -> String {
    let status = &snap.status;
    let mut lines = vec![
        "📋 CONTEXT SNAPSHOT".to_string(),
        format!("Project: {}", status.project),
    ];
    status_header(status, now, &mut lines);
    lines.push(String::new());

    if !snap.pinned.is_empty() {
        lines.push("PINNED (system/), always in agent context:".to_string());
        for (path, preview) in &snap.pinned {
            lines.push(format!("  --- {path} ---"));
            lines.push(format!("  {}", preview.replace('\n', "\n  ")));
            lines.push(String::new());
        }
    }

    let on_branch = status.branch != DEFAULT_BRANCH;
    if on_branch && !snap.branch_memory.is_empty() {
        lines.push(format!(
            "MEMORY [branch: {}] ({} files):",
            status.branch,
            snap.branch_memory.len()
        ));
        described(&snap.branch_memory, &mut lines);
    }
    if !snap.main_memory.is_empty() {
        if on_branch {
            lines.push(format!(
                "MEMORY [main] ({} files, use 'amem read memory/<file>' for global):",
                snap.main_memory.len()
            ));
        } else {
            lines.push(format!("MEMORY ({} files):", snap.main_memory.len()));
        }
        described(&snap.main_memory, &mut lines);
    }

    if !snap.branches.is_empty() {
        lines.push(format!("BRANCHES ({}):", snap.branches.len()));
        for b in &snap.branches {
            let purpose = if b.purpose.is_empty() { "(no purpose set)" } else { &b.purpose };
            let merged = if b.merged { " [merged]" } else { "" };
            lines.push(format!("  {} — {}{}", b.name, purpose, merged));
        }
        lines.push(String::new());
    }

    if let Some(latest) = snap.reflections.first() {
        let name = latest.rsplit('/').next().unwrap_or(latest);
        lines.push(format!(
            "REFLECTIONS: {} total, latest: {}",
            snap.reflections.len(),
            name
        ));
        lines.push(String::new());
    }

    lines.push(format!("CONFIG: {}", config_line(status)));
    lines.join("\n")
}

// ============================================================
// Branches
// ============================================================

pub fn branches(current: &str, branches: &[BranchInfo]) -> String {
    let mut lines = vec!["📂 BRANCHES:".to_string()];
    let marker = |is_current: bool| if is_current { "* " } else { "  " };
    lines.push(format!("  {}main (default)", marker(current == DEFAULT_BRANCH)));

    if branches.is_empty() {
        lines.push(String::new());
        lines.push("  No exploration branches yet.".to_string());
        lines.push("  Create one: amem branch <name> \"purpose\"".to_string());
        return lines.join("\n");
    }
    for b in branches {
        let purpose = if b.purpose.is_empty() { "(no purpose)" } else { &b.purpose };
        let merged = if b.merged { " [merged]" } else { "" };
        lines.push(format!("  {}{} — {}{}", marker(b.current), b.name, purpose, merged));
    }
    lines.join("\n")
}

pub fn diff(name: &str, diffs: &[FileDiff], verbose: bool) -> String {
    let mut lines = vec![format!("🔀 DIFF: main ↔ {name}"), String::new()];
    if diffs.is_empty() {
        lines.push("No differences found.".to_string());
        return lines.join("\n");
    }

    let (mut total_added, mut total_removed) = (0, 0);
    for d in diffs {
        match &d.change {
            FileChange::Added { lines: count } => {
                total_added += count;
                lines.push(format!("  + {} (new, {} lines)", d.path, count));
            }
            FileChange::Modified { added, removed } => {
                total_added += added.len();
                total_removed += removed.len();
                lines.push(format!("  ~ {} (+{} / -{})", d.path, added.len(), removed.len()));
                if verbose {
                    for line in added.iter().take(DIFF_SAMPLE) {
                        lines.push(format!("    + {line}"));
                    }
                    for line in removed.iter().take(DIFF_SAMPLE) {
                        lines.push(format!("    - {line}"));
                    }
                    let more_added = added.len().saturating_sub(DIFF_SAMPLE);
                    let more_removed = removed.len().saturating_sub(DIFF_SAMPLE);
                    if more_added > 0 || more_removed > 0 {
                        lines.push(format!(
                            "    ... and {more_added} more added, {more_removed} more removed"
                        ));
                    }
                }
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Summary: {} changed, +{} / -{} lines",
        plural(diffs.len(), "file"),
        total_added,
        total_removed
    ));
    lines.join("\n")
}

// ============================================================
// Lifecycle reports
// ============================================================

pub fn compact(report: &CompactReport) -> String {
    let plan = &report.plan;
    let mode = if plan.mode == CompactMode::Hard { " --hard" } else { "" };
    let marker = if report.dry_run { " (dry run)" } else { "" };
    let mut lines = vec![format!("🗜️  COMPACT{mode}{marker}"), String::new()];

    if let Some(hash) = &report.checkpoint {
        lines.insert(0, format!("💾 Pre-compact checkpoint: {hash}"));
    }

    if !plan.kept.is_empty() {
        lines.push("KEPT:".to_string());
        for k in &plan.kept {
            let extra = k.count.map(|n| format!(" ({n})")).unwrap_or_default();
            lines.push(format!("  ✅ {}{} — {}", k.path, extra, k.reason));
        }
        lines.push(String::new());
    }

    if plan.archived.is_empty() {
        lines.push("Nothing to compact, context is already lean.".to_string());
        lines.push(String::new());
    } else {
        lines.push("ARCHIVED:".to_string());
        for a in &plan.archived {
            let extra = a
                .entries
                .map(|(dropped, kept)| format!(" ({dropped} entries dropped, {kept} kept)"))
                .unwrap_or_default();
            lines.push(format!("  📦 {}{} — {}", a.path, extra, a.reason));
        }
        lines.push(String::new());
    }

    let before = plan.before_bytes;
    let after = report.after_bytes;
    let delta = before.abs_diff(after);
    let pct = if before > 0 {
        delta as f64 / before as f64 * 100.0
    } else {
        0.0
    };
    let sign = if after <= before { '-' } else { '+' };
    lines.push(format!(
        "SIZE: {} → {} ({}{}, {:.1}% reduction)",
        format_bytes(before),
        format_bytes(after),
        sign,
        format_bytes(delta),
        pct
    ));

    if !report.dry_run && !plan.archived.is_empty() {
        lines.push(format!("ARCHIVE: .context/{}/", plan.archive_dir()));
    }
    if let Some(hash) = &report.commit {
        lines.push(format!("COMMIT: {hash}"));
    }
    if report.dry_run && !plan.archived.is_empty() {
        lines.push(String::new());
        lines.push("Run without --dry-run to apply.".to_string());
    }
    lines.join("\n")
}

pub fn defrag(report: &DefragReport, dry_run: bool) -> String {
    let marker = if dry_run { " (dry run)" } else { "" };
    let mut lines = vec![format!("🔧 DEFRAG ANALYSIS{marker}"), String::new()];

    if !report.oversized.is_empty() {
        lines.push("OVERSIZED FILES:".to_string());
        for o in &report.oversized {
            lines.push(format!("  {} — {} entries, {}", o.file, o.entries, format_bytes(o.size)));
            lines.push("  ⤷ Suggest: split by domain or time period".to_string());
        }
        lines.push(String::new());
    }

    if !report.duplicates.is_empty() {
        lines.push("POTENTIAL DUPLICATES:".to_string());
        for d in &report.duplicates {
            lines.push(format!(
                "  {} line {} ↔ line {} ({:.0}% similar)",
                d.file,
                d.line_a,
                d.line_b,
                d.similarity * 100.0
            ));
            lines.push(format!("    \"{}\"", d.text_a));
            lines.push(format!("    \"{}\"", d.text_b));
            lines.push("  ⤷ Suggest: merge into single, more specific entry".to_string());
        }
        lines.push(String::new());
    }

    if !report.stale.is_empty() {
        lines.push(format!(
            "STALE ENTRIES (>{} days, unreferenced):",
            report.stale_days
        ));
        for s in &report.stale {
            lines.push(format!(
                "  {} line {} — [{}] \"{}\"",
                s.file,
                s.line,
                s.date.format("%Y-%m-%d"),
                s.text
            ));
        }
        lines.push("  ⤷ Suggest: archive or remove if no longer relevant".to_string());
        lines.push(String::new());
    }

    if !report.structural.is_empty() {
        lines.push("STRUCTURAL ISSUES:".to_string());
        for s in &report.structural {
            lines.push(format!("  {} — {}", s.file, s.issue));
        }
        lines.push(String::new());
    }

    if report.issue_count() == 0 {
        lines.push("No issues found.".to_string());
        lines.push(String::new());
    }

    lines.push(format!(
        "Memory health: {} ({})",
        report.health(),
        plural(report.issue_count(), "issue")
    ));
    lines.push(String::new());
    lines.extend(
        [
            "═══ INSTRUCTIONS ═══",
            "To flag stale entries in place:",
            "  amem reflect defrag --apply",
            "",
            "Or run a full reflect cycle to address holistically:",
            "  amem reflect gather --deep",
        ]
        .map(str::to_string),
    );
    lines.join("\n")
}

pub fn history(history: &History) -> String {
    if history.total == 0 {
        return "No reflections yet. Run: amem reflect gather".to_string();
    }

    let mut lines = vec![format!(
        "📜 REFLECTION HISTORY ({} of {})",
        history.reflections.len(),
        history.total
    )];
    lines.push(String::new());
    for r in &history.reflections {
        let count = |n: Option<usize>| n.map_or("?".to_string(), |n| n.to_string());
        lines.push(format!(
            "{} | {} commits | {} gaps | {} stale",
            r.date,
            count(r.commits_reviewed),
            count(r.gaps_filled),
            count(r.stale_flagged)
        ));
        if let Some(summary) = &r.summary {
            lines.push(format!("  {}", truncate(summary, 200)));
        }
    }

    if !history.recurring_themes.is_empty() {
        lines.push(String::new());
        lines.push("RECURRING THEMES:".to_string());
        for (word, n) in &history.recurring_themes {
            lines.push(format!("  {word} ({n} reflections)"));
        }
    }
    lines.join("\n")
}

pub fn resolve(report: &ResolveReport, dry_run: bool) -> String {
    if report.files.is_empty() {
        return "✅ No merge conflicts in .context/".to_string();
    }

    let marker = if dry_run { " (dry run)" } else { "" };
    let n = report.files.len();
    let mut lines = vec![
        format!("🔀 RESOLVE{marker}"),
        format!("Found {} conflicted:", plural(n, "file")),
        String::new(),
    ];
    for f in &report.files {
        lines.push(format!("  {} — {} ({})", f.path, f.strategy, plural(f.blocks, "block")));
    }
    lines.push(String::new());
    if dry_run {
        lines.push("Run without --dry-run to apply resolutions.".to_string());
    } else {
        lines.push(format!("✅ Resolved {}", plural(n, "file")));
        if let Some(hash) = &report.commit {
            lines.push(format!("Committed: {hash}"));
        }
    }
    lines.join("\n")
}

pub fn search(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("🔍 SEARCH: \"{query}\"\nNo results found.");
    }
    let mut lines = vec![
        format!("🔍 SEARCH: \"{query}\" ({} matches)", hits.len()),
        String::new(),
    ];
    for (i, hit) in hits.iter().take(SEARCH_LIMIT).enumerate() {
        lines.push(format!(
            "{}. {}:{} — {}",
            i + 1,
            hit.path,
            hit.line,
            truncate(&hit.text, SEARCH_PREVIEW)
        ));
    }
    if hits.len() > SEARCH_LIMIT {
        lines.push(String::new());
        lines.push(format!("... and {} more matches", hits.len() - SEARCH_LIMIT));
    }
    lines.join("\n")
}
