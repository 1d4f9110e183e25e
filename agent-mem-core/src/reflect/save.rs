use chrono::{DateTime, Utc};

use super::parse::{extract_gaps, extract_stale, extract_summary, parse, Gap, StaleRef};
use super::{read_state, write_state, REFLECTIONS_DIR};
use crate::branch;
use crate::defrag::{self, StaleEntry};
use crate::error::{MemError, Result};
use crate::models::{Category, Entry, ReflectionState, Timestamp};
use crate::store::ContextStore;
use crate::vcs::Vcs;

const MAX_SUBJECT: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub file: String,
    /// `(target path, entry text)` for each gap appended.
    pub gaps: Vec<(String, String)>,
    pub stale_flagged: usize,
    pub summary: Option<String>,
    pub recognized: bool,
    pub commit: Option<String>,
}

fn gap_entry(gap: &Gap, timestamp: Timestamp) -> Entry {
    match &gap.lesson {
        Some(fields) => Entry::lesson(timestamp, &gap.text, fields),
        None => Entry::bullet(timestamp, &gap.text),
    }
}

/// Strip a leading `[date]` that agents often copy along with the entry text.
fn reference_text(text: &str) -> &str {
    match text.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        Some((_, after)) => after.trim(),
        None => text.trim(),
    }
}

/// Locate each referenced bullet in its main-line file.
fn locate_stale(store: &ContextStore, refs: &[StaleRef]) -> Result<Vec<StaleEntry>> {
    let mut found = Vec::new();
    for stale in refs {
        let file = match store.load(&stale.file) {
            Ok(Some(file)) => file,
            Ok(None) => {
                tracing::debug!("Stale reference to missing {}", stale.file);
                continue;
            }
            Err(e) => {
                tracing::warn!("Ignoring stale reference {}: {}", stale.file, e);
                continue;
            }
        };
        let needle: String = reference_text(&stale.text).to_lowercase().chars().take(30).collect();
        if needle.is_empty() {
            continue;
        }
        let hit = file
            .bullets()
            .find(|e| e.text().to_lowercase().contains(&needle));
        match hit {
            Some(entry) => found.push(StaleEntry {
                file: stale.file.clone(),
                line: entry.line,
                date: entry.date(),
                text: entry.text().to_string(),
            }),
            None => tracing::debug!("No entry in {} matches {:?}", stale.file, stale.text),
        }
    }
    Ok(found)
}

fn next_reflection_path(store: &ContextStore, date: &str) -> Result<String> {
    let base = format!("{REFLECTIONS_DIR}/{date}.md");
    if !store.exists(&base)? {
        return Ok(base);
    }
    let mut n = 2;
    loop {
        let candidate = format!("{REFLECTIONS_DIR}/{date}-{n}.md");
        if !store.exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Breadcrumb for this save, falling back to the first commit when gather
/// left none behind or it could not be read.
fn current_state(store: &ContextStore, vcs: &dyn Vcs, now: DateTime<Utc>) -> ReflectionState {
    if let Some(state) = read_state(store) {
        return state;
    }
    let today = now.format("%Y-%m-%d").to_string();
    let first = vcs.first_commit();
    ReflectionState {
        window_start: first
            .as_ref()
            .map(|c| c.date.chars().take(10).collect())
            .unwrap_or_else(|| today.clone()),
        window_end: today,
        commits_reviewed: vcs.commit_count(first.as_ref().map(|c| c.hash.as_str())),
        last_commit_hash: vcs.last_commit().map(|c| c.hash),
        since_ref: first.map(|c| c.hash),
        gathered_at: now,
        saved_at: None,
        reflection_file: None,
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

/// Save a reflection written by the agent.
///
/// Gaps and lessons become entries in the active branch's category files,
/// stale references get markers, and the full text is kept as a dated
/// reflection file. Ends with one commit.
pub fn save(
    store: &ContextStore,
    vcs: &dyn Vcs,
    text: &str,
    active_branch: &str,
    now: DateTime<Utc>,
) -> Result<SaveOutcome> {
    if text.trim().is_empty() {
        return Err(MemError::InvalidInput("Reflection text is empty".to_string()));
    }

    let parsed = parse(text);
    let mut gaps = extract_gaps(parsed.section("gaps"), None);
    gaps.extend(extract_gaps(parsed.section("lessons"), Some(Category::Lesson)));

    let timestamp = Timestamp::from_datetime(now.naive_utc());
    let mut written = Vec::new();
    for gap in &gaps {
        let target = branch::resolve_target(gap.category.file(), active_branch);
        let entry = gap_entry(gap, timestamp);
        store.append_entry(&target, &entry, &gap.category.default_header())?;
        written.push((target, gap.text.clone()));
    }

    let stale = locate_stale(store, &extract_stale(parsed.section("stale")))?;
    let stale_flagged = defrag::apply_stale_markers(store, &stale, now.date_naive())?;

    let mut state = current_state(store, vcs, now);
    let date = now.format("%Y-%m-%d").to_string();
    let file = next_reflection_path(store, &date)?;
    let frontmatter = [
        "---".to_string(),
        format!("date: {date}"),
        format!("window_start: {}", state.window_start),
        format!("window_end: {}", state.window_end),
        format!("commits_reviewed: {}", state.commits_reviewed),
        format!(
            "last_commit_hash: {}",
            state.last_commit_hash.as_deref().unwrap_or("null")
        ),
        format!("gaps_filled: {}", written.len()),
        format!("stale_flagged: {stale_flagged}"),
        "---".to_string(),
    ]
    .join("\n");
    store.write(
        &file,
        &format!("{frontmatter}\n\n# Reflection: {date}\n\n{}\n", text.trim()),
    )?;

    state.saved_at = Some(now);
    state.reflection_file = Some(file.clone());
    write_state(store, &state)?;

    let summary = extract_summary(&parsed);
    let subject = match &summary {
        Some(s) => format!("reflect: {}", truncate(s, MAX_SUBJECT)),
        None => format!("reflect: {date}"),
    };
    let commit = vcs.commit(&subject)?;

    tracing::info!(
        "Saved {} ({} gaps, {} stale)",
        file,
        written.len(),
        stale_flagged
    );
    Ok(SaveOutcome {
        file,
        gaps: written,
        stale_flagged,
        summary,
        recognized: parsed.recognized,
        commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_text_drops_leading_stamp() {
        assert_eq!(reference_text("[2025-01-01] Use MySQL"), "Use MySQL");
        assert_eq!(reference_text("Use MySQL"), "Use MySQL");
    }

    #[test]
    fn truncate_respects_chars() {
        assert_eq!(truncate("short", 72), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
