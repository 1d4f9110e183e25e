use once_cell::sync::Lazy;
use regex::Regex;

use super::entry::{Entry, EntryBody, Timestamp};

static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^- \[(\d{4}-\d{2}-\d{2}[\s\d:]*)\]\s*(.+)$").expect("valid bullet regex")
});
static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^### \[(\d{4}-\d{2}-\d{2}[\s\d:]*)\]\s*(.+)$").expect("valid block regex")
});
static STALE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^- \[\d{4}-\d{2}-\d{2} STALE\]").expect("valid stale regex"));
static FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^---\n(.*?)\n---\n?(.*)$").expect("valid frontmatter regex"));
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^description:[ \t]*['"]?(.*?)['"]?[ \t]*$"#).expect("valid description regex")
});
static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^limit:[ \t]*(\d+)").expect("valid limit regex"));
static READ_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^read_only:[ \t]*true").expect("valid read_only regex"));

/// Fields recognised in a file's `---` front-matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    pub description: Option<String>,
    pub limit: Option<u64>,
    pub read_only: bool,
}

impl Frontmatter {
    /// Parse front-matter at the top of `text`. Files without it yield defaults.
    pub fn parse(text: &str) -> Self {
        let Some(caps) = FRONTMATTER_RE.captures(text) else {
            return Self::default();
        };
        let block = &caps[1];
        Self {
            description: DESCRIPTION_RE
                .captures(block)
                .map(|c| c[1].to_string())
                .filter(|d| !d.is_empty()),
            limit: LIMIT_RE.captures(block).and_then(|c| c[1].parse().ok()),
            read_only: READ_ONLY_RE.is_match(block),
        }
    }
}

/// Everything after the front-matter block, or the whole text if there is none.
pub fn strip_frontmatter(text: &str) -> &str {
    FRONTMATTER_RE
        .captures(text)
        .and_then(|c| c.get(2))
        .map_or(text, |m| m.as_str())
}

/// True for a `- [date STALE]` marker line.
pub fn is_stale_marker(line: &str) -> bool {
    STALE_RE.is_match(line)
}

/// Parse a bullet entry line, returning its timestamp and text.
pub fn parse_bullet(line: &str) -> Option<(Timestamp, String)> {
    let caps = BULLET_RE.captures(line)?;
    let timestamp = Timestamp::parse(caps[1].trim())?;
    Some((timestamp, caps[2].to_string()))
}

fn parse_block_heading(line: &str) -> Option<(Timestamp, String)> {
    let caps = BLOCK_RE.captures(line)?;
    let timestamp = Timestamp::parse(caps[1].trim())?;
    Some((timestamp, caps[2].to_string()))
}

/// A categorized markdown file split into its header and ordered entries.
///
/// The header is every line before the first entry (front-matter, title,
/// blank lines) and is written back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// Path relative to the context root, e.g. `memory/decisions.md`.
    pub path: String,
    pub header: String,
    pub entries: Vec<Entry>,
}

struct OpenBlock {
    timestamp: Timestamp,
    title: String,
    lines: Vec<String>,
    line: usize,
}

impl OpenBlock {
    fn finish(mut self) -> Entry {
        while self.lines.len() > 1 && self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
        let raw = self.lines.join("\n");
        let body = self.lines[1..].to_vec();
        Entry {
            timestamp: self.timestamp,
            body: EntryBody::Block {
                title: self.title,
                body,
            },
            raw,
            stale_markers: Vec::new(),
            line: self.line,
        }
    }
}

impl MemoryFile {
    pub fn new(path: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            header: header.into(),
            entries: Vec::new(),
        }
    }

    /// Split `content` into a header and entries.
    ///
    /// A block absorbs every following line, bullets included, until the next
    /// `###` heading or the end of the file. Blank lines trailing a block are
    /// dropped. Stale markers attach to the bullet they follow. Any other line
    /// that appears after the first entry is not part of an entry and is not
    /// retained.
    pub fn parse(path: impl Into<String>, content: &str) -> Self {
        let mut header_lines: Vec<&str> = Vec::new();
        let mut entries: Vec<Entry> = Vec::new();
        let mut block: Option<OpenBlock> = None;
        let mut in_header = true;

        for (idx, line) in content.split('\n').enumerate() {
            let line_no = idx + 1;

            if let Some((timestamp, title)) = parse_block_heading(line) {
                if let Some(open) = block.take() {
                    entries.push(open.finish());
                }
                in_header = false;
                block = Some(OpenBlock {
                    timestamp,
                    title,
                    lines: vec![line.to_string()],
                    line: line_no,
                });
                continue;
            }

            if let Some(open) = block.as_mut() {
                open.lines.push(line.to_string());
                continue;
            }

            if let Some((timestamp, text)) = parse_bullet(line) {
                in_header = false;
                entries.push(Entry {
                    timestamp,
                    body: EntryBody::Bullet { text },
                    raw: line.to_string(),
                    stale_markers: Vec::new(),
                    line: line_no,
                });
                continue;
            }

            if is_stale_marker(line) {
                in_header = false;
                if let Some(last) = entries.last_mut() {
                    last.stale_markers.push(line.to_string());
                }
                continue;
            }

            if in_header {
                header_lines.push(line);
            }
        }

        if let Some(open) = block.take() {
            entries.push(open.finish());
        }

        Self {
            path: path.into(),
            header: header_lines.join("\n"),
            entries,
        }
    }

    /// Header, then entries one per line with a blank line before every block
    /// after the first entry, then a trailing newline.
    pub fn serialize(&self) -> String {
        serialize_entries(&self.header, self.entries.iter())
    }

    pub fn frontmatter(&self) -> Frontmatter {
        Frontmatter::parse(&self.header)
    }

    pub fn bullets(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_bullet())
    }
}

/// Render a header and a sequence of entries in the canonical file layout.
pub fn serialize_entries<'a>(header: &str, entries: impl IntoIterator<Item = &'a Entry>) -> String {
    let mut body: Vec<String> = Vec::new();
    for entry in entries {
        if !body.is_empty() && !entry.is_bullet() {
            body.push(String::new());
        }
        body.push(entry.to_text());
    }
    if body.is_empty() {
        return if header.ends_with('\n') || header.is_empty() {
            header.to_string()
        } else {
            format!("{header}\n")
        };
    }
    format!("{header}\n{}\n", body.join("\n"))
}
