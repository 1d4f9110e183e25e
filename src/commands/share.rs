use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use agent_mem_core::share;
use agent_mem_core::store::find_project_root;

use super::{now, print_commit, Session};
use crate::render::format_bytes;

pub fn export(output: Option<PathBuf>) -> Result<()> {
    let session = Session::open()?;
    let project = session.project();
    let envelope = share::export(&session.store, &session.git, &project, session.branch(), now())?;
    let json = share::to_json(&envelope)?;

    let file_name = share::file_name(&project, &json);
    let dir = output.unwrap_or_else(|| session.root.clone());
    let path = dir.join(&file_name);
    fs::write(&path, &json).with_context(|| format!("Could not write {}", path.display()))?;

    println!("✅ SHARED: {file_name}");
    println!("  Project: {project}");
    println!(
        "  Files: {} | Size: {} | Commits: {}",
        envelope.files.len(),
        format_bytes(json.len() as u64),
        envelope.commits
    );
    println!("  Path: {}", path.display());
    println!();
    println!("To import on another machine:");
    println!("  amem import {file_name}");
    Ok(())
}

pub fn import(file: &Path, merge: bool) -> Result<()> {
    let json = fs::read_to_string(file)
        .with_context(|| format!("Could not read {}", file.display()))?;
    let envelope = share::parse(&json)?;

    let cwd = std::env::current_dir().context("Could not read the current directory")?;
    let root = find_project_root(&cwd).unwrap_or(cwd);
    let session = Session::open_or_create(&root)?;
    let _lock = session.lock()?;
    let outcome = share::import(&session.store, &session.git, &envelope, merge)?;

    println!("✅ IMPORTED: {}", envelope.project);
    if outcome.skipped > 0 {
        println!(
            "  Files written: {} | Skipped (existing): {}",
            outcome.written, outcome.skipped
        );
    } else {
        println!("  Files written: {}", outcome.written);
    }
    println!(
        "  Source: {} commits, created {}",
        envelope.commits,
        envelope.created_at.format("%Y-%m-%d")
    );
    print_commit("Committed", outcome.commit.as_deref());
    println!();
    println!("Run: amem snapshot");
    Ok(())
}
