//! Everyday entry operations: remember, lesson, forget, pin and search.
//!
//! Writes into `memory/` go through [`branch::resolve_target`], so while a
//! branch is active new entries land in its sparse overlay.

use chrono::{NaiveDate, NaiveDateTime};

use crate::branch;
use crate::config::CONFIG_FILE;
use crate::error::{MemError, Result};
use crate::models::{default_header, Category, Entry, Frontmatter, LessonFields, Timestamp};
use crate::store::ContextStore;

/// Separator of the `problem -> resolution` lesson shorthand.
const LESSON_ARROW: &str = "->";

/// Append a bullet to a category file, or to `file` when given.
///
/// Returns the path actually written.
pub fn remember(
    store: &ContextStore,
    category: Category,
    file: Option<&str>,
    text: &str,
    active_branch: &str,
    now: NaiveDateTime,
) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MemError::InvalidInput(format!(
            "No text provided. Usage: amem remember --{} \"your text\"",
            category.as_str()
        )));
    }

    let base = match file {
        Some(path) => store.normalize_visible(path)?,
        None => category.file().to_string(),
    };
    let target = branch::resolve_target(&base, active_branch);
    let header = match file {
        Some(_) => default_header(category.description(), category.title()),
        None => category.default_header(),
    };
    store.append_entry(&target, &Entry::bullet(Timestamp::from_datetime(now), text), &header)?;
    tracing::info!("Remembered {} in {}", category.as_str(), target);
    Ok(target)
}

/// A lesson ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub title: String,
    pub fields: LessonFields,
}

impl Lesson {
    /// Build a lesson from explicit flags or the `problem -> resolution` shorthand.
    ///
    /// Explicit `problem` and `resolution` win; otherwise `text` must contain
    /// the arrow with content on both sides.
    pub fn from_input(
        text: &str,
        problem: Option<&str>,
        resolution: Option<&str>,
        tags: Option<&str>,
    ) -> Result<Self> {
        let text = text.trim();
        let tags = tags.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);

        if let (Some(problem), Some(resolution)) = (problem, resolution) {
            let (problem, resolution) = (problem.trim(), resolution.trim());
            if problem.is_empty() || resolution.is_empty() {
                return Err(MemError::InvalidInput(
                    "Lessons need a non-empty problem and resolution.".to_string(),
                ));
            }
            let title = if text.is_empty() { problem } else { text };
            return Ok(Self {
                title: title.to_string(),
                fields: LessonFields {
                    problem: problem.to_string(),
                    resolution: resolution.to_string(),
                    tags,
                },
            });
        }

        let Some((before, after)) = text.split_once(LESSON_ARROW) else {
            return Err(MemError::InvalidInput(
                "Lessons need a problem and resolution: use --problem/--resolution or \"problem -> resolution\"."
                    .to_string(),
            ));
        };
        let (before, after) = (before.trim(), after.trim());
        if before.is_empty() || after.is_empty() {
            return Err(MemError::InvalidInput(
                "Both sides of -> must have content.".to_string(),
            ));
        }
        Ok(Self {
            title: format!("{before} — {after}"),
            fields: LessonFields {
                problem: before.to_string(),
                resolution: after.to_string(),
                tags,
            },
        })
    }
}

/// Append a lesson block to the active branch's lessons file.
pub fn lesson(
    store: &ContextStore,
    lesson: &Lesson,
    active_branch: &str,
    now: NaiveDateTime,
) -> Result<String> {
    let target = branch::resolve_target(Category::Lesson.file(), active_branch);
    let entry = Entry::lesson(Timestamp::from_datetime(now), &lesson.title, &lesson.fields);
    store.append_entry(&target, &entry, &Category::Lesson.default_header())?;
    tracing::info!("Recorded lesson in {}", target);
    Ok(target)
}

/// Archive a file under `archive/forgotten-<date>/` and remove it.
///
/// Pinned files and the config are refused. Returns the archive path.
pub fn forget(store: &ContextStore, path: &str, today: NaiveDate) -> Result<String> {
    let path = store.normalize_visible(path)?;
    if path.starts_with("system/") {
        return Err(MemError::InvalidInput(format!(
            "Refusing to forget pinned file {path}; unpin it first"
        )));
    }
    if path == CONFIG_FILE || path.starts_with("archive/") {
        return Err(MemError::InvalidInput(format!("Refusing to forget {path}")));
    }
    let content = store
        .read(&path)?
        .ok_or_else(|| MemError::NotFound(format!(".context/{path}")))?;

    let archived = format!("archive/forgotten-{}/{path}", today.format("%Y-%m-%d"));
    store.write(&archived, &content)?;
    store.remove(&path)?;
    tracing::info!("Forgot {} (archived to {})", path, archived);
    Ok(archived)
}

/// Create or replace a context file. Returns the normalised path and whether
/// it already existed.
pub fn write(store: &ContextStore, path: &str, content: &str) -> Result<(String, bool)> {
    let path = store.normalize_visible(path)?;
    let existed = store.exists(&path)?;
    store.write(&path, content)?;
    tracing::info!("Wrote {} ({} bytes)", path, content.len());
    Ok((path, existed))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn move_between(store: &ContextStore, path: &str, from: &str, to: &str) -> Result<(String, String)> {
    let prefix = format!("{from}/");
    let src = if path.starts_with(&prefix) {
        store.normalize_visible(path)?
    } else {
        store.normalize_visible(&format!("{prefix}{path}"))?
    };
    let dest = format!("{to}/{}", file_name(&src));
    if !store.exists(&src)? {
        return Err(MemError::NotFound(format!(".context/{src}")));
    }
    if store.exists(&dest)? {
        return Err(MemError::Conflict(format!(".context/{dest} already exists")));
    }
    store.rename(&src, &dest)?;
    Ok((src, dest))
}

/// Move a file from `memory/` into `system/`. Returns `(from, to)`.
pub fn pin(store: &ContextStore, path: &str) -> Result<(String, String)> {
    let moved = move_between(store, path, "memory", "system")?;
    tracing::info!("Pinned {} -> {}", moved.0, moved.1);
    Ok(moved)
}

/// Move a file from `system/` back into `memory/`. Returns `(from, to)`.
pub fn unpin(store: &ContextStore, path: &str) -> Result<(String, String)> {
    let moved = move_between(store, path, "system", "memory")?;
    tracing::info!("Unpinned {} -> {}", moved.0, moved.1);
    Ok(moved)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    /// 1-based.
    pub line: usize,
    pub text: String,
}

/// Case-insensitive substring search over every non-hidden context file.
pub fn search(store: &ContextStore, query: &str) -> Result<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(MemError::InvalidInput("Usage: amem search <query>".to_string()));
    }

    let mut hits = Vec::new();
    for path in store.walk(None)? {
        let Some(content) = store.read(&path)? else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                hits.push(SearchHit {
                    path: path.clone(),
                    line: i + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    Ok(hits)
}

/// Front-matter description of a context file, if it declares one.
pub fn description(store: &ContextStore, path: &str) -> Result<Option<String>> {
    Ok(store
        .read(path)?
        .and_then(|text| Frontmatter::parse(&text).description))
}
