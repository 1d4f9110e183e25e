//! Memory health diagnostics: oversized files, near-duplicate entries,
//! stale entries and structural defects.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;

use crate::compact;
use crate::config::ReflectionConfig;
use crate::error::Result;
use crate::models::{is_stale_marker, parse_bullet, strip_frontmatter, Entry, MemoryFile};
use crate::store::ContextStore;
use crate::vcs::Vcs;

/// Pairs at or above this Jaccard similarity are reported as duplicates.
pub const DUPLICATE_SIMILARITY: f64 = 0.6;

/// Characters of an entry compared against reflection text.
const REAFFIRM_PREFIX: usize = 30;

const REAFFIRMING_SECTIONS: [&str; 2] = ["## Patterns Identified", "## Decisions Validated"];

/// Lowercase alphanumeric tokens longer than two characters.
pub fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, zero when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub max_entries: usize,
    pub max_kb: u64,
    pub stale_days: i64,
}

impl From<&ReflectionConfig> for Thresholds {
    fn from(config: &ReflectionConfig) -> Self {
        Self {
            max_entries: config.defrag_threshold,
            max_kb: config.defrag_size_kb,
            stale_days: config.stale_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Oversized {
    pub file: String,
    pub entries: usize,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub file: String,
    pub line_a: usize,
    pub line_b: usize,
    pub text_a: String,
    pub text_b: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaleEntry {
    pub file: String,
    pub line: usize,
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralIssue {
    MissingDescription,
    Empty,
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDescription => f.write_str("missing frontmatter (description)"),
            Self::Empty => f.write_str("empty (no entries)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structural {
    pub file: String,
    pub issue: StructuralIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Good,
    Fair,
    NeedsAttention,
}

impl Health {
    pub fn from_issue_count(issues: usize) -> Self {
        match issues {
            0 => Self::Good,
            1..=3 => Self::Fair,
            _ => Self::NeedsAttention,
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("GOOD"),
            Self::Fair => f.write_str("FAIR"),
            Self::NeedsAttention => f.write_str("NEEDS_ATTENTION"),
        }
    }
}

/// Findings in report order: oversized, duplicates, stale, structural.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefragReport {
    pub oversized: Vec<Oversized>,
    pub duplicates: Vec<Duplicate>,
    pub stale: Vec<StaleEntry>,
    pub structural: Vec<Structural>,
    pub stale_days: i64,
}

impl DefragReport {
    pub fn issue_count(&self) -> usize {
        self.oversized.len() + self.duplicates.len() + self.stale.len() + self.structural.len()
    }

    pub fn health(&self) -> Health {
        Health::from_issue_count(self.issue_count())
    }
}

/// Lowercased text of every "Patterns Identified" and "Decisions Validated"
/// section across all reflections.
pub fn reaffirmed_text(store: &ContextStore) -> Result<String> {
    let mut collected = Vec::new();
    for path in store.list_markdown("reflections")? {
        let Some(raw) = store.read(&path)? else {
            continue;
        };
        let mut inside = false;
        for line in strip_frontmatter(&raw).lines() {
            if line.starts_with("## ") {
                inside = REAFFIRMING_SECTIONS.iter().any(|s| line.trim_end() == *s);
            }
            if inside {
                collected.push(line.to_lowercase());
            }
        }
    }
    Ok(collected.join("\n"))
}

fn is_reaffirmed(entry: &Entry, reaffirmed: &str) -> bool {
    let prefix = preview(&entry.text().to_lowercase(), REAFFIRM_PREFIX);
    reaffirmed.contains(&prefix)
}

/// Analyze every main-line memory file.
///
/// Duplicate and stale checks look at bullet entries.
pub fn analyze(store: &ContextStore, thresholds: Thresholds, today: NaiveDate) -> Result<DefragReport> {
    let mut report = DefragReport {
        stale_days: thresholds.stale_days,
        ..DefragReport::default()
    };
    let reaffirmed = reaffirmed_text(store)?;
    let stale_before = compact::days_before(today, thresholds.stale_days);

    for path in store.list_markdown("memory")? {
        let Some(content) = store.read(&path)? else {
            continue;
        };
        let size = content.len() as u64;
        let file = MemoryFile::parse(path.as_str(), &content);
        let bullets: Vec<&Entry> = file.bullets().collect();

        if file.entries.len() > thresholds.max_entries || size > thresholds.max_kb * 1024 {
            report.oversized.push(Oversized {
                file: path.clone(),
                entries: file.entries.len(),
                size,
            });
        }

        if file.frontmatter().description.is_none() && !file.entries.is_empty() {
            report.structural.push(Structural {
                file: path.clone(),
                issue: StructuralIssue::MissingDescription,
            });
        }
        if file.entries.is_empty() && content.trim().lines().count() <= 6 {
            report.structural.push(Structural {
                file: path.clone(),
                issue: StructuralIssue::Empty,
            });
        }

        let words: Vec<HashSet<String>> = bullets.iter().map(|e| word_set(e.text())).collect();
        for i in 0..bullets.len() {
            for j in (i + 1)..bullets.len() {
                let similarity = jaccard(&words[i], &words[j]);
                if similarity >= DUPLICATE_SIMILARITY {
                    report.duplicates.push(Duplicate {
                        file: path.clone(),
                        line_a: bullets[i].line,
                        line_b: bullets[j].line,
                        text_a: preview(bullets[i].text(), 80),
                        text_b: preview(bullets[j].text(), 80),
                        similarity,
                    });
                }
            }
        }

        for entry in &bullets {
            if entry.date() < stale_before && !entry.is_stale() && !is_reaffirmed(entry, &reaffirmed) {
                report.stale.push(StaleEntry {
                    file: path.clone(),
                    line: entry.line,
                    date: entry.date(),
                    text: preview(entry.text(), 80),
                });
            }
        }
    }

    tracing::debug!(
        "Defrag: {} issues across memory files",
        report.issue_count()
    );
    Ok(report)
}

/// Insert a stale marker after each flagged bullet.
///
/// Lines are processed from the bottom of each file up so earlier insertions
/// do not shift later targets. A bullet that already carries a marker, or a
/// line that is no longer a bullet, is skipped. Returns the markers written.
pub fn apply_stale_markers(store: &ContextStore, stale: &[StaleEntry], today: NaiveDate) -> Result<usize> {
    let mut by_file: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for entry in stale {
        by_file.entry(entry.file.as_str()).or_default().push(entry.line);
    }

    let marker = Entry::stale_marker(today);
    let mut marked = 0;
    for (file, mut lines) in by_file {
        let Some(content) = store.read(file)? else {
            continue;
        };
        let mut rows: Vec<String> = content.split('\n').map(str::to_string).collect();
        lines.sort_unstable_by(|a, b| b.cmp(a));
        lines.dedup();

        let mut changed = false;
        for line in lines {
            let Some(idx) = line.checked_sub(1) else {
                continue;
            };
            let is_target = rows.get(idx).is_some_and(|r| parse_bullet(r).is_some());
            let already = rows.get(idx + 1).is_some_and(|r| is_stale_marker(r));
            if is_target && !already {
                rows.insert(idx + 1, marker.clone());
                marked += 1;
                changed = true;
            }
        }
        if changed {
            store.write(file, &rows.join("\n"))?;
        }
    }
    Ok(marked)
}

/// Flag stale entries and commit. Returns the marker count and commit hash.
pub fn apply(
    store: &ContextStore,
    vcs: &dyn Vcs,
    report: &DefragReport,
    today: NaiveDate,
) -> Result<(usize, Option<String>)> {
    let marked = apply_stale_markers(store, &report.stale, today)?;
    if marked == 0 {
        return Ok((0, None));
    }
    let hash = vcs.commit(&format!("reflect: defrag flagged {marked} stale entries"))?;
    tracing::info!("Flagged {} stale entries", marked);
    Ok((marked, hash))
}
