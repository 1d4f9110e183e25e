use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// The kind of fact an entry records, which also decides its file.
///
/// - `Decision`: architectural choices and branch merge outcomes
/// - `Pattern`: approaches that keep working
/// - `Mistake`: anti-patterns to avoid
/// - `Note`: everything else (the default)
/// - `Lesson`: problem/resolution pairs, stored as multi-line blocks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Decision,
    Pattern,
    Mistake,
    Note,
    Lesson,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Decision,
        Self::Pattern,
        Self::Mistake,
        Self::Note,
        Self::Lesson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Pattern => "pattern",
            Self::Mistake => "mistake",
            Self::Note => "note",
            Self::Lesson => "lesson",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "decision" => Some(Self::Decision),
            "pattern" => Some(Self::Pattern),
            "mistake" => Some(Self::Mistake),
            "note" => Some(Self::Note),
            "lesson" => Some(Self::Lesson),
            _ => None,
        }
    }

    /// Main-line path of this category's memory file.
    pub fn file(&self) -> &'static str {
        match self {
            Self::Decision => "memory/decisions.md",
            Self::Pattern => "memory/patterns.md",
            Self::Mistake => "memory/mistakes.md",
            Self::Note => "memory/notes.md",
            Self::Lesson => "memory/lessons.md",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Decision => "Decisions",
            Self::Pattern => "Patterns",
            Self::Mistake => "Mistakes",
            Self::Note => "Notes",
            Self::Lesson => "Lessons Learned",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Decision => "Architectural decisions and branch merge outcomes",
            Self::Pattern => "Learned patterns and best practices",
            Self::Mistake => "Anti-patterns and things to avoid",
            Self::Note => "Quick notes and observations",
            Self::Lesson => "Lessons learned, problem/resolution pairs",
        }
    }

    /// Header written when a category file is created by an append.
    pub fn default_header(&self) -> String {
        default_header(self.description(), self.title())
    }

    /// Guess the category of a memory file from its file name.
    pub fn for_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next()?;
        Self::ALL
            .into_iter()
            .find(|c| c.file().rsplit('/').next() == Some(name))
    }
}

/// Front-matter header plus title line, ending with a newline.
pub fn default_header(description: &str, title: &str) -> String {
    format!("---\ndescription: \"{description}\"\n---\n\n# {title}\n")
}

/// When an entry was recorded: day resolution, with an optional minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl Timestamp {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    /// Truncates to the minute, which is what entry lines record.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let time = NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0);
        Self {
            date: dt.date(),
            time,
        }
    }

    /// Parse the inside of an entry's brackets, e.g. `2026-01-01 10:00`.
    pub fn parse(stamp: &str) -> Option<Self> {
        let mut parts = stamp.split_whitespace();
        let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
        let time = parts.next().and_then(|t| {
            NaiveTime::parse_from_str(t, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
                .ok()
        });
        Some(Self { date, time })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{} {}", self.date.format("%Y-%m-%d"), time.format("%H:%M")),
            None => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// The content of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    /// `- [stamp] text`, exactly one line.
    Bullet { text: String },
    /// `### [stamp] title` followed by every line up to the next `###` heading.
    Block { title: String, body: Vec<String> },
}

/// The structured part of a lesson block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LessonFields {
    pub problem: String,
    pub resolution: String,
    pub tags: Option<String>,
}

/// One fact recorded in memory.
///
/// `raw` holds the entry exactly as it appears in its file so that rewriting a
/// file never reformats entries it did not touch. Stale markers are kept
/// beside the entry rather than inside it: flagging is non-destructive and
/// compaction drops the markers while keeping or archiving the entry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub timestamp: Timestamp,
    pub body: EntryBody,
    pub raw: String,
    pub stale_markers: Vec<String>,
    /// 1-based line of the entry's first line. Zero for entries built in memory.
    pub line: usize,
}

impl Entry {
    pub fn bullet(timestamp: Timestamp, text: &str) -> Self {
        Self {
            timestamp,
            body: EntryBody::Bullet {
                text: text.to_string(),
            },
            raw: format!("- [{timestamp}] {text}"),
            stale_markers: Vec::new(),
            line: 0,
        }
    }

    pub fn block(timestamp: Timestamp, title: &str, body: Vec<String>) -> Self {
        let mut lines = vec![format!("### [{timestamp}] {title}")];
        lines.extend(body.iter().cloned());
        Self {
            timestamp,
            body: EntryBody::Block {
                title: title.to_string(),
                body,
            },
            raw: lines.join("\n"),
            stale_markers: Vec::new(),
            line: 0,
        }
    }

    pub fn lesson(timestamp: Timestamp, title: &str, fields: &LessonFields) -> Self {
        let mut body = vec![
            format!("**Problem:** {}", fields.problem),
            format!("**Resolution:** {}", fields.resolution),
        ];
        if let Some(tags) = &fields.tags {
            body.push(format!("**Tags:** {tags}"));
        }
        Self::block(timestamp, title, body)
    }

    /// Marker line inserted after an entry judged stale on `date`.
    pub fn stale_marker(date: NaiveDate) -> String {
        format!(
            "- [{} STALE] ^^^ flagged as stale, may be outdated",
            date.format("%Y-%m-%d")
        )
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date
    }

    /// Bullet text, or the title of a block.
    pub fn text(&self) -> &str {
        match &self.body {
            EntryBody::Bullet { text } => text,
            EntryBody::Block { title, .. } => title,
        }
    }

    /// First line of the entry as written.
    pub fn heading(&self) -> &str {
        self.raw.lines().next().unwrap_or_default()
    }

    pub fn is_bullet(&self) -> bool {
        matches!(self.body, EntryBody::Bullet { .. })
    }

    pub fn is_stale(&self) -> bool {
        !self.stale_markers.is_empty()
    }

    /// Problem/resolution fields when this entry is a lesson block.
    pub fn lesson_fields(&self) -> Option<LessonFields> {
        let EntryBody::Block { body, .. } = &self.body else {
            return None;
        };
        let mut fields = LessonFields::default();
        let mut found = false;
        for line in body {
            if let Some(v) = line.strip_prefix("**Problem:**") {
                fields.problem = v.trim().to_string();
                found = true;
            } else if let Some(v) = line.strip_prefix("**Resolution:**") {
                fields.resolution = v.trim().to_string();
                found = true;
            } else if let Some(v) = line.strip_prefix("**Tags:**") {
                fields.tags = Some(v.trim().to_string());
            }
        }
        found.then_some(fields)
    }

    /// The entry as it should be written back, markers included.
    pub fn to_text(&self) -> String {
        let mut out = self.raw.clone();
        for marker in &self.stale_markers {
            out.push('\n');
            out.push_str(marker);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn timestamp_round_trips_with_and_without_time() {
        assert_eq!(ts("2026-01-01 10:00").to_string(), "2026-01-01 10:00");
        assert_eq!(ts("2026-01-01").to_string(), "2026-01-01");
        assert!(Timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn bullet_renders_single_line() {
        let entry = Entry::bullet(ts("2026-02-03 09:15"), "Use WAL mode");
        assert_eq!(entry.raw, "- [2026-02-03 09:15] Use WAL mode");
        assert!(entry.is_bullet());
    }

    #[test]
    fn lesson_exposes_fields() {
        let fields = LessonFields {
            problem: "Hit 429".to_string(),
            resolution: "Backoff".to_string(),
            tags: Some("api".to_string()),
        };
        let entry = Entry::lesson(ts("2026-02-03 09:15"), "Rate limits", &fields);
        assert_eq!(
            entry.raw,
            "### [2026-02-03 09:15] Rate limits\n**Problem:** Hit 429\n**Resolution:** Backoff\n**Tags:** api"
        );
        assert_eq!(entry.lesson_fields(), Some(fields));
    }

    #[test]
    fn category_lookup_by_path() {
        assert_eq!(
            Category::for_path("branches/x/memory/lessons.md"),
            Some(Category::Lesson)
        );
        assert_eq!(Category::for_path("memory/custom.md"), None);
    }
}
