//! Command handlers behind the `amem` subcommands.
//!
//! Handlers open a [`Session`] on the nearest `.context/`, take the advisory
//! lock when they mutate, call into `agent_mem_core` and print a report.

use std::fs;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use agent_mem_core::config::Config;
use agent_mem_core::lock::ContextLock;
use agent_mem_core::store::{find_project_root, ContextStore};
use agent_mem_core::vcs::Git;

pub mod branch;
pub mod entries;
pub mod lifecycle;
pub mod reflect;
pub mod share;

/// An open context directory.
pub struct Session {
    pub root: PathBuf,
    pub store: ContextStore,
    pub git: Git,
    pub config: Config,
}

impl Session {
    /// Find the nearest `.context/` above the current directory.
    pub fn open() -> Result<Self> {
        let cwd = std::env::current_dir().context("Could not read the current directory")?;
        let root = find_project_root(&cwd)
            .ok_or_else(|| anyhow!("No .context/ found. Run 'amem init' first."))?;
        Self::at(&root)
    }

    /// Open the context of `project_root`, creating `.context/` and its git
    /// repository first when they are missing.
    pub fn open_or_create(project_root: &Path) -> Result<Self> {
        let context_dir = create_context_dir(project_root)?;
        Git::init(&context_dir)?;
        Self::at(project_root)
    }

    pub fn at(project_root: &Path) -> Result<Self> {
        let store = ContextStore::for_project(project_root);
        let git = Git::new(store.root());
        let config = Config::load(&store).context("Could not read config.yaml")?;
        tracing::debug!("Opened context at {}", store.root().display());
        Ok(Self {
            root: project_root.to_path_buf(),
            store,
            git,
            config,
        })
    }

    pub fn project(&self) -> String {
        project_name(&self.root)
    }

    /// Advisory lock held until the returned guard is dropped.
    pub fn lock(&self) -> Result<ContextLock> {
        Ok(ContextLock::acquire(&self.root)?)
    }

    pub fn branch(&self) -> &str {
        &self.config.branch
    }
}

/// Make sure `.context/` exists under `project_root` and return its path.
pub fn create_context_dir(project_root: &Path) -> Result<PathBuf> {
    let store = ContextStore::for_project(project_root);
    let dir = store.root().to_path_buf();
    if !dir.is_dir() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
        tracing::info!("Created {}", dir.display());
    }
    Ok(dir)
}

pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Text from a flag, falling back to piped stdin.
pub fn content_or_stdin(content: Option<String>, what: &str) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(anyhow!("No {what} provided. Use --content or pipe stdin."));
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .context("Could not read stdin")?;
    if buf.trim().is_empty() {
        return Err(anyhow!("No {what} provided. Use --content or pipe stdin."));
    }
    Ok(buf)
}

fn print_commit(label: &str, hash: Option<&str>) {
    if let Some(hash) = hash {
        println!("{label}: {hash}");
    }
}
