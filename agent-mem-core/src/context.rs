//! Bootstrapping a context directory and summarising its state.

use chrono::NaiveDate;

use crate::branch::{self, BranchInfo, DEFAULT_BRANCH};
use crate::config::Config;
use crate::error::{MemError, Result};
use crate::memory::description;
use crate::models::strip_frontmatter;
use crate::reflect::{self, reflection_files};
use crate::store::ContextStore;
use crate::vcs::{CommitInfo, Vcs};

pub const INIT_COMMIT: &str = "init: bootstrap context";

/// Pinned previews are cut to this many characters.
const PREVIEW_CHARS: usize = 500;

const LAYOUT_DIRS: [&str; 4] = ["system/humans", "memory", "branches", "reflections"];

/// Create the directory layout, starter files and default config.
///
/// An existing `.context/` is a conflict unless `force` is set. The caller
/// initialises the repository and takes the bootstrap commit. Returns the
/// files written.
pub fn init(store: &ContextStore, project: &str, force: bool, today: NaiveDate) -> Result<Vec<String>> {
    if store.root().exists() && !force {
        return Err(MemError::Conflict(
            ".context/ already exists. Use --force to reinitialize.".to_string(),
        ));
    }

    for dir in LAYOUT_DIRS {
        store.create_dir(dir)?;
    }

    let files = [
        (
            "main.md",
            format!(
                "# {project}\n\n## Goals\n- [ ] Define project goals\n\n## Milestones\n- [ ] Define milestones\n\n## Status\nInitialized: {}\n",
                today.format("%Y-%m-%d")
            ),
        ),
        (
            "system/project.md",
            format!(
                "---\ndescription: \"Project: {project}\"\nlimit: 10000\n---\n\n# {project}\n"
            ),
        ),
        (
            "system/conventions.md",
            "---\ndescription: \"Coding conventions and style rules\"\nlimit: 5000\n---\n\n# Conventions\n\nAdd project-specific coding conventions here.\n"
                .to_string(),
        ),
    ];

    let mut written = Vec::new();
    for (path, content) in files {
        store.write(path, &content)?;
        written.push(path.to_string());
    }
    Config::default().save(store)?;
    written.push(crate::config::CONFIG_FILE.to_string());

    tracing::info!("Initialised {} for {}", store.root().display(), project);
    Ok(written)
}

/// Commits since the window start the next `reflect gather` would use.
pub fn commits_since_reflection(store: &ContextStore, vcs: &dyn Vcs) -> Result<usize> {
    let since = reflect::resolve_since(store, vcs, None)?;
    Ok(vcs.commit_count(since.as_deref()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub project: String,
    pub branch: String,
    pub commits: usize,
    pub dirty: bool,
    pub last: Option<CommitInfo>,
    pub pinned: usize,
    pub memory: usize,
    pub reflections: usize,
    pub branches: usize,
    pub config: Config,
}

pub fn status(store: &ContextStore, vcs: &dyn Vcs, project: &str) -> Result<Status> {
    let config = Config::load(store)?;
    Ok(Status {
        project: project.to_string(),
        branch: config.branch.clone(),
        commits: vcs.commit_count(None),
        dirty: vcs.has_changes(),
        last: vcs.last_commit(),
        pinned: store.walk(Some("system"))?.len(),
        memory: store.walk(Some("memory"))?.len(),
        reflections: reflection_files(store)?.len(),
        branches: store.list_dirs("branches")?.len(),
        config,
    })
}

/// A file listed with its front-matter description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Described {
    pub path: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: Status,
    /// `(path, body preview)` for every pinned file.
    pub pinned: Vec<(String, String)>,
    /// The active branch's own memory files; empty on main.
    pub branch_memory: Vec<Described>,
    pub main_memory: Vec<Described>,
    pub branches: Vec<BranchInfo>,
    /// Newest first.
    pub reflections: Vec<String>,
}

fn preview(text: &str) -> String {
    let body = strip_frontmatter(text).trim();
    if body.chars().count() <= PREVIEW_CHARS {
        return body.to_string();
    }
    let mut short: String = body.chars().take(PREVIEW_CHARS - 3).collect();
    short.push_str("...");
    short
}

fn describe_all(store: &ContextStore, dir: &str) -> Result<Vec<Described>> {
    let mut out = Vec::new();
    for path in store.walk(Some(dir))? {
        out.push(Described {
            description: description(store, &path)?,
            path,
        });
    }
    Ok(out)
}

/// Everything an agent needs to orient itself at the start of a session.
pub fn snapshot(store: &ContextStore, vcs: &dyn Vcs, project: &str) -> Result<Snapshot> {
    let status = status(store, vcs, project)?;

    let mut pinned = Vec::new();
    for path in store.walk(Some("system"))? {
        if let Some(text) = store.read(&path)? {
            pinned.push((path, preview(&text)));
        }
    }

    let branch_memory = if status.branch == DEFAULT_BRANCH {
        Vec::new()
    } else {
        describe_all(store, &format!("branches/{}/memory", status.branch))?
    };

    let mut reflections = reflection_files(store)?;
    reflections.reverse();

    Ok(Snapshot {
        pinned,
        branch_memory,
        main_memory: describe_all(store, "memory")?,
        branches: branch::list(store)?,
        reflections,
        status,
    })
}
