//! Filesystem access to a `.context/` directory.
//!
//! Every path handed to [`ContextStore`] is relative to the context root and is
//! normalised before use; anything that would resolve outside the root is
//! rejected with [`MemError::InvalidPath`] regardless of the caller.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{MemError, Result};
use crate::models::{Entry, MemoryFile};

/// Name of the context directory inside a project.
pub const CONTEXT_DIR: &str = ".context";

/// Walk up from `start` to the nearest directory containing `.context/`.
///
/// Returns the project root (the parent of `.context/`).
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONTEXT_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Reads and writes files under one context root.
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
}

impl ContextStore {
    /// Open a store rooted at an existing (or about to be created) context directory.
    pub fn open(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: context_dir.into(),
        }
    }

    /// Open the `.context/` directory of a project.
    pub fn for_project(project_root: &Path) -> Self {
        Self::open(project_root.join(CONTEXT_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalise a relative path, rejecting absolute paths and escapes.
    pub fn normalize(&self, rel: &str) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(MemError::InvalidPath(rel.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(MemError::InvalidPath(rel.to_string()));
                }
            }
        }
        if parts.is_empty() {
            return Err(MemError::InvalidPath(rel.to_string()));
        }
        Ok(parts.join("/"))
    }

    /// Like [`normalize`](Self::normalize), but also rejects hidden components
    /// such as `.git/`. Paths supplied by users or snapshots go through here.
    pub fn normalize_visible(&self, rel: &str) -> Result<String> {
        let normalized = self.normalize(rel)?;
        if normalized.split('/').any(|part| part.starts_with('.')) {
            return Err(MemError::InvalidPath(rel.to_string()));
        }
        Ok(normalized)
    }

    /// Absolute path of a context-relative path.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.normalize(rel)?))
    }

    pub fn exists(&self, rel: &str) -> Result<bool> {
        Ok(self.resolve(rel)?.exists())
    }

    pub fn is_dir(&self, rel: &str) -> Result<bool> {
        Ok(self.resolve(rel)?.is_dir())
    }

    /// Read a file. Absence is `Ok(None)`; callers decide whether that is an error.
    pub fn read(&self, rel: &str) -> Result<Option<String>> {
        let path = self.resolve(rel)?;
        if path.is_dir() {
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        tracing::debug!("Wrote {} ({} bytes)", rel, content.len());
        Ok(())
    }

    pub fn create_dir(&self, rel: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(rel)?)?;
        Ok(())
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(MemError::NotFound(format!(".context/{rel}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a file within the context, preserving its content.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dest = self.resolve(to)?;
        if !src.is_file() {
            return Err(MemError::NotFound(format!(".context/{from}")));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dest)?;
        Ok(())
    }

    pub fn file_size(&self, rel: &str) -> Result<u64> {
        Ok(fs::metadata(self.resolve(rel)?)?.len())
    }

    /// Non-hidden names directly inside `dir`, sorted. Missing directories are empty.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.resolve(dir)?;
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for item in fs::read_dir(&path)? {
            let name = item?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Sub-directories of `dir`, sorted.
    pub fn list_dirs(&self, dir: &str) -> Result<Vec<String>> {
        let mut dirs = Vec::new();
        for name in self.list(dir)? {
            if self.is_dir(&format!("{dir}/{name}"))? {
                dirs.push(name);
            }
        }
        Ok(dirs)
    }

    /// Relative paths of the markdown files directly inside `dir`, sorted.
    pub fn list_markdown(&self, dir: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for name in self.list(dir)? {
            let rel = format!("{dir}/{name}");
            if name.ends_with(".md") && self.resolve(&rel)?.is_file() {
                files.push(rel);
            }
        }
        Ok(files)
    }

    /// Every non-hidden file below `dir` (or the whole root when `None`), as
    /// sorted context-relative paths. Hidden directories such as `.git` are skipped.
    pub fn walk(&self, dir: Option<&str>) -> Result<Vec<String>> {
        let base = match dir {
            Some(d) => self.resolve(d)?,
            None => self.root.clone(),
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = item.path().strip_prefix(&self.root) {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(rel.join("/"));
            }
        }
        Ok(files)
    }

    /// Total size of the live context: every non-hidden file outside `archive/`.
    pub fn live_bytes(&self) -> Result<u64> {
        let mut total = 0;
        for rel in self.walk(None)? {
            if rel.starts_with("archive/") {
                continue;
            }
            total += self.file_size(&rel)?;
        }
        Ok(total)
    }

    // ============================================================
    // Memory file operations
    // ============================================================

    /// Load and parse a memory file.
    pub fn load(&self, rel: &str) -> Result<Option<MemoryFile>> {
        Ok(self.read(rel)?.map(|content| MemoryFile::parse(rel, &content)))
    }

    /// Write a memory file back in canonical layout.
    pub fn save(&self, file: &MemoryFile) -> Result<()> {
        self.write(&file.path, &file.serialize())
    }

    /// Append one entry, creating the file with `default_header` when absent.
    ///
    /// Bullets are appended on the next line; blocks are preceded by a blank line.
    pub fn append_entry(&self, rel: &str, entry: &Entry, default_header: &str) -> Result<()> {
        self.append_entries(rel, std::slice::from_ref(entry), default_header)
    }

    /// Append several entries in order with a single write.
    pub fn append_entries(&self, rel: &str, entries: &[Entry], default_header: &str) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let (mut content, no_entries_yet) = match self.read(rel)? {
            Some(existing) => {
                let empty = MemoryFile::parse(rel, &existing).entries.is_empty();
                (existing, empty)
            }
            None => {
                let mut header = default_header.to_string();
                if !header.ends_with('\n') {
                    header.push('\n');
                }
                header.push('\n');
                (header, true)
            }
        };

        for (i, entry) in entries.iter().enumerate() {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            let needs_gap = if i == 0 && no_entries_yet {
                !content.is_empty() && !content.ends_with("\n\n")
            } else {
                !entry.is_bullet()
            };
            if needs_gap {
                content.push('\n');
            }
            content.push_str(&entry.to_text());
            content.push('\n');
        }

        self.write(rel, &content)
    }
}
