use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Category, LessonFields};

/// Canonical section keys and the header substrings that select them,
/// tested in order.
const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("patterns", &["pattern"]),
    ("decisions", &["decision", "validated"]),
    ("lessons", &["lesson"]),
    ("contradictions", &["contradict"]),
    ("stale", &["stale"]),
    ("gaps", &["gap", "new entr"]),
    ("themes", &["theme"]),
    ("summary", &["summar"]),
];

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^##\s+(.+)").expect("valid header regex"));
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(type|text|problem|resolution|tags):\s*").expect("valid field regex")
});
static STALE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(memory/[\w-]+\.md)(?:\s*line\s*\d+)?\s*[:—-]\s*(.+)")
        .expect("valid stale reference regex")
});

/// Map a `## ` header to its section key, or a slug for unknown headers.
pub fn section_key(header: &str) -> String {
    let lower = header.to_lowercase();
    for (key, needles) in SECTION_KEYS {
        if needles.iter().any(|n| lower.contains(n)) {
            return key.to_string();
        }
    }
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Reflection text bucketed by section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReflection {
    /// Non-blank lines under each section key.
    pub sections: BTreeMap<String, Vec<String>>,
    /// True when at least one known section was found.
    pub recognized: bool,
}

impl ParsedReflection {
    pub fn section(&self, key: &str) -> &[String] {
        self.sections.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

pub fn parse(text: &str) -> ParsedReflection {
    let mut parsed = ParsedReflection::default();
    let mut current: Option<String> = None;

    for line in text.split('\n') {
        if let Some(caps) = HEADER_RE.captures(line) {
            let key = section_key(caps[1].trim());
            if SECTION_KEYS.iter().any(|(k, _)| *k == key) {
                parsed.recognized = true;
            }
            parsed.sections.entry(key.clone()).or_default();
            current = Some(key);
            continue;
        }
        if let Some(key) = &current {
            if !line.trim().is_empty() {
                parsed
                    .sections
                    .entry(key.clone())
                    .or_default()
                    .push(line.to_string());
            }
        }
    }
    parsed
}

/// A memory entry proposed by a reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub category: Category,
    pub text: String,
    /// Present for lessons with both a problem and a resolution.
    pub lesson: Option<LessonFields>,
}

#[derive(Debug, Default)]
struct Pending {
    category: Option<Category>,
    text: Option<String>,
    problem: Option<String>,
    resolution: Option<String>,
    tags: Option<String>,
}

impl Pending {
    fn has(&self, field: &str) -> bool {
        match field {
            "text" => self.text.is_some(),
            "problem" => self.problem.is_some(),
            "resolution" => self.resolution.is_some(),
            "tags" => self.tags.is_some(),
            _ => false,
        }
    }

    fn set(&mut self, field: &str, value: String) {
        match field {
            "text" => self.text = Some(value),
            "problem" => self.problem = Some(value),
            "resolution" => self.resolution = Some(value),
            "tags" => self.tags = Some(value),
            _ => {}
        }
    }

    fn is_blank(&self) -> bool {
        self.text.is_none() && self.problem.is_none() && self.resolution.is_none()
    }

    /// A lesson without both sides is kept as a note.
    fn finish(self) -> Option<Gap> {
        let category = self.category?;
        if category != Category::Lesson {
            return Some(Gap {
                category,
                text: self.text?,
                lesson: None,
            });
        }
        match (self.problem, self.resolution) {
            (Some(problem), Some(resolution)) => Some(Gap {
                category,
                text: self.text.unwrap_or_else(|| problem.clone()),
                lesson: Some(LessonFields {
                    problem,
                    resolution,
                    tags: self.tags,
                }),
            }),
            (problem, resolution) => {
                let text = self.text.or(problem).or(resolution)?;
                Some(Gap {
                    category: Category::Note,
                    text,
                    lesson: None,
                })
            }
        }
    }
}

/// `key: value` pairs found in one line, in order.
fn fields(line: &str) -> Vec<(String, String)> {
    let matches: Vec<_> = FIELD_RE.captures_iter(line).collect();
    let mut out = Vec::new();
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(line.len(), |m| m.start());
        let value = line[whole.end()..end]
            .trim()
            .trim_end_matches([',', ';'])
            .trim()
            .to_string();
        out.push((name.as_str().to_lowercase(), value));
    }
    out
}

/// Pull structured entries out of a gaps or lessons section.
///
/// Accepts the multi-line form (`- type: pattern` then `  text: ...`) and the
/// inline form (`- type: pattern, text: ...`). Lines in a section with a
/// `default` category need no `type:` line.
pub fn extract_gaps(lines: &[String], default: Option<Category>) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut pending = Pending {
        category: default,
        ..Pending::default()
    };

    for line in lines {
        let trimmed = line.trim().trim_start_matches('-').trim();
        for (field, value) in fields(trimmed) {
            if field == "type" {
                let previous = std::mem::take(&mut pending);
                gaps.extend(previous.finish());
                let word = value.split_whitespace().next().unwrap_or_default();
                pending.category = Category::from_str(word);
                if pending.category.is_none() {
                    tracing::debug!("Ignoring entry with unknown type {:?}", value);
                }
                continue;
            }
            if value.is_empty() {
                continue;
            }
            if pending.has(&field) {
                let category = pending.category.or(default);
                let previous = std::mem::take(&mut pending);
                gaps.extend(previous.finish());
                pending.category = category;
            }
            pending.set(&field, value);
        }
    }
    if !pending.is_blank() {
        gaps.extend(pending.finish());
    }
    gaps
}

/// An entry the reflection wants flagged as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleRef {
    pub file: String,
    pub text: String,
}

/// Parse `memory/<file>.md[ line N]: <entry text>` references.
pub fn extract_stale(lines: &[String]) -> Vec<StaleRef> {
    lines
        .iter()
        .filter_map(|line| {
            let trimmed = line.trim().trim_start_matches('-').trim();
            let caps = STALE_REF_RE.captures(trimmed)?;
            Some(StaleRef {
                file: caps[1].to_string(),
                text: caps[2].trim().to_string(),
            })
        })
        .collect()
}

pub fn extract_summary(parsed: &ParsedReflection) -> Option<String> {
    let lines = parsed.section("summary");
    let summary = lines
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ");
    (!summary.is_empty()).then_some(summary)
}
