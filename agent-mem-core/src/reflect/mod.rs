//! The reflection cycle.
//!
//! `gather` renders a prompt covering everything since the last reflection
//! and records a breadcrumb; `save` parses the agent's answer back into
//! memory entries and writes a dated reflection file. `history` is a
//! read-only view over saved reflections.

mod gather;
mod history;
mod parse;
mod save;

pub use gather::{gather, resolve_since, GatherOptions, Gathered};
pub use history::{history, History};
pub use parse::{extract_gaps, extract_stale, extract_summary, parse, section_key, Gap, ParsedReflection, StaleRef};
pub use save::{save, SaveOutcome};

use crate::error::Result;
use crate::models::ReflectionState;
use crate::store::ContextStore;

/// Hidden breadcrumb linking gather to save.
pub const STATE_FILE: &str = ".reflect-state.json";

pub const REFLECTIONS_DIR: &str = "reflections";

/// Read the breadcrumb. Missing or corrupt state is `None`.
pub fn read_state(store: &ContextStore) -> Option<ReflectionState> {
    let raw = match store.read(STATE_FILE) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Could not read {}: {}", STATE_FILE, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!("Discarding corrupt {}: {}", STATE_FILE, e);
            None
        }
    }
}

pub fn write_state(store: &ContextStore, state: &ReflectionState) -> Result<()> {
    store.write(STATE_FILE, &serde_json::to_string_pretty(state)?)
}

fn sort_key(path: &str) -> (String, u32) {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.trim_end_matches(".md");
    if stem.len() > 10 && stem.is_char_boundary(10) {
        let (date, rest) = stem.split_at(10);
        if let Some(n) = rest.strip_prefix('-').and_then(|n| n.parse().ok()) {
            return (date.to_string(), n);
        }
    }
    (stem.to_string(), 1)
}

/// Reflection files oldest first, with `<date>-2.md` after `<date>.md`.
pub fn reflection_files(store: &ContextStore) -> Result<Vec<String>> {
    let mut files = store.list_markdown(REFLECTIONS_DIR)?;
    files.sort_by_cached_key(|f| sort_key(f));
    Ok(files)
}

/// Value of `key` in a `---` front-matter block, unquoted.
pub fn frontmatter_value(text: &str, key: &str) -> Option<String> {
    let rest = text.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    rest[..end].lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}

/// Lines of the `## <title>` section in `body`, up to the next `## ` header.
pub fn section_lines<'a>(body: &'a str, title: &str) -> Vec<&'a str> {
    let mut inside = false;
    let mut lines = Vec::new();
    for line in body.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            inside = header.trim() == title;
            continue;
        }
        if inside {
            lines.push(line);
        }
    }
    lines
}
