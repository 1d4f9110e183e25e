use anyhow::Result;

use agent_mem_core::branch;
use agent_mem_core::vcs::Vcs;

use super::{now, print_commit, Session};
use crate::render;

pub fn create(name: &str, purpose: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    branch::create(&session.store, name, purpose, now().date_naive())?;
    let hash = session.git.commit(&format!("branch: create {name}"))?;

    println!("✅ BRANCHED: {name}");
    if !purpose.trim().is_empty() {
        println!("Purpose: {}", purpose.trim());
    }
    println!("Switched to branch: {name}");
    println!("Files: branches/{name}/{{purpose,commits,trace}}.md");
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn switch(name: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let previous = branch::switch_to(&session.store, name)?;
    println!("✅ SWITCHED: {previous} → {name}");
    let hash = session
        .config
        .maybe_auto_commit(&session.git, &format!("switch {previous} -> {name}"))?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn merge(name: &str, summary: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let outcome = branch::merge_back(&session.store, name, summary, now().naive_utc())?;
    let hash = session.git.commit(&format!("merge: {name} -> main"))?;

    println!("✅ MERGED: {name} → main");
    if !summary.trim().is_empty() {
        println!("Summary: {}", summary.trim());
    }
    println!("Branch findings saved to memory/decisions.md");
    for (path, count) in &outcome.files {
        println!("  {path}: +{count} entries");
    }
    println!("Switched to: main");
    print_commit("Committed", hash.as_deref());
    println!();
    println!("Note: branch files preserved at branches/{name}/ for reference.");
    Ok(())
}

pub fn list() -> Result<()> {
    let session = Session::open()?;
    let branches = branch::list(&session.store)?;
    println!("{}", render::branches(session.branch(), &branches));
    Ok(())
}

pub fn diff(name: &str, verbose: bool) -> Result<()> {
    let session = Session::open()?;
    let diffs = branch::diff(&session.store, name)?;
    println!("{}", render::diff(name, &diffs, verbose));
    Ok(())
}
