use std::path::Path;

use anyhow::{Context, Result};

use agent_mem_core::compact::{self, CompactMode};
use agent_mem_core::config::Config;
use agent_mem_core::context::{self, INIT_COMMIT};
use agent_mem_core::resolve;
use agent_mem_core::store::ContextStore;
use agent_mem_core::vcs::{Git, Vcs};

use super::{now, print_commit, project_name, Session};
use crate::render;

pub fn init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Could not read the current directory")?;
    init_at(&cwd, force)
}

pub fn init_at(project_root: &Path, force: bool) -> Result<()> {
    let project = project_name(project_root);
    let store = ContextStore::for_project(project_root);
    let files = context::init(&store, &project, force, now().date_naive())?;
    let git = Git::init(store.root())?;
    let hash = git.commit(INIT_COMMIT)?;

    println!("✅ INITIALIZED: .context/");
    println!("Project: {project}");
    println!();
    println!("Files created:");
    for file in &files {
        println!("  {file}");
    }
    println!("  memory/, branches/, reflections/ (empty)");
    print_commit("Git commit", hash.as_deref());
    println!();
    println!("Next steps:");
    println!("  amem snapshot                         view your context");
    println!("  amem write system/conventions.md      add your coding rules");
    println!("  amem commit \"added conventions\"       checkpoint");
    Ok(())
}

pub fn commit(message: Option<String>) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    if !session.git.has_changes() {
        println!("ℹ️  No changes to commit.");
        return Ok(());
    }

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("checkpoint {}", now().format("%Y-%m-%dT%H:%M")));
    let Some(hash) = session.git.commit(&message)? else {
        println!("ℹ️  No changes to commit.");
        return Ok(());
    };

    println!("✅ COMMITTED: \"{message}\"");
    println!("Commit: {hash} | Total: {}", session.git.commit_count(None));

    let pending = context::commits_since_reflection(&session.store, &session.git)?;
    if session.config.reflection_due(pending) {
        println!();
        println!("💭 {pending} commits since the last reflection. Consider: amem reflect gather");
    }
    Ok(())
}

pub fn status() -> Result<()> {
    let session = Session::open()?;
    let status = context::status(&session.store, &session.git, &session.project())?;
    println!("{}", render::status(&status, now()));
    Ok(())
}

pub fn snapshot() -> Result<()> {
    let session = Session::open()?;
    let snapshot = context::snapshot(&session.store, &session.git, &session.project())?;
    println!("{}", render::snapshot(&snapshot, now()));
    Ok(())
}

pub fn compact(hard: bool, dry_run: bool) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let mode = if hard { CompactMode::Hard } else { CompactMode::Default };
    let report = compact::compact(
        &session.store,
        &session.git,
        mode,
        session.config.compact.retain_days,
        now().date_naive(),
        dry_run,
    )?;
    println!("{}", render::compact(&report));
    Ok(())
}

pub fn resolve(dry_run: bool) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let report = resolve::resolve_all(&session.store, &session.git, dry_run)?;
    println!("{}", render::resolve(&report, dry_run));
    Ok(())
}

pub fn config_show() -> Result<()> {
    let session = Session::open()?;
    println!("⚙️  CONFIG (.context/config.yaml):\n");
    print!("{}", session.config.to_yaml()?);
    Ok(())
}

pub fn config_set(key: &str, value: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let mut config: Config = session.config.clone();
    config.set(key, value)?;
    config.save(&session.store)?;
    println!("✅ CONFIG: {key} = {value}");
    Ok(())
}
