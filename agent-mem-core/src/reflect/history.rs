use std::collections::{BTreeMap, BTreeSet};

use super::parse::{extract_summary, parse};
use super::{frontmatter_value, reflection_files};
use crate::error::Result;
use crate::models::{strip_frontmatter, ReflectionSummary};
use crate::store::ContextStore;

/// A theme word must appear in this many of the listed reflections.
const RECURRING_MIN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct History {
    /// Newest first.
    pub reflections: Vec<ReflectionSummary>,
    /// `(word, reflections mentioning it)`, most frequent first.
    pub recurring_themes: Vec<(String, usize)>,
    pub total: usize,
}

fn theme_words(lines: &[String]) -> BTreeSet<String> {
    lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| word.chars().count() > 3)
        .collect()
}

fn number(text: &str, key: &str) -> Option<usize> {
    frontmatter_value(text, key).and_then(|v| v.parse().ok())
}

/// The last `limit` reflections and the themes that keep coming back.
pub fn history(store: &ContextStore, limit: usize) -> Result<History> {
    let files = reflection_files(store)?;
    let total = files.len();

    let mut reflections = Vec::new();
    let mut theme_counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in files.iter().rev().take(limit) {
        let Some(text) = store.read(file)? else {
            continue;
        };
        let parsed = parse(strip_frontmatter(&text));
        for word in theme_words(parsed.section("themes")) {
            *theme_counts.entry(word).or_default() += 1;
        }

        let date = frontmatter_value(&text, "date").unwrap_or_else(|| {
            file.trim_start_matches("reflections/")
                .trim_end_matches(".md")
                .to_string()
        });
        reflections.push(ReflectionSummary {
            file: file.clone(),
            date,
            commits_reviewed: number(&text, "commits_reviewed"),
            gaps_filled: number(&text, "gaps_filled"),
            stale_flagged: number(&text, "stale_flagged"),
            summary: extract_summary(&parsed),
        });
    }

    let mut recurring_themes: Vec<(String, usize)> = theme_counts
        .into_iter()
        .filter(|(_, n)| *n >= RECURRING_MIN)
        .collect();
    recurring_themes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(History {
        reflections,
        recurring_themes,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_words_strip_punctuation_and_short_words() {
        let lines = vec!["- Testing, always!".to_string(), "- the API layer".to_string()];
        let words: Vec<String> = theme_words(&lines).into_iter().collect();
        assert_eq!(words, vec!["always", "layer", "testing"]);
    }
}
