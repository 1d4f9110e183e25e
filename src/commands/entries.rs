use anyhow::{anyhow, Result};

use agent_mem_core::memory::{self, Lesson};
use agent_mem_core::models::Category;
use agent_mem_core::vcs::Vcs;
use agent_mem_core::MemError;

use super::{content_or_stdin, now, print_commit, Session};
use crate::render;

pub fn remember(category: Category, file: Option<String>, text: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let target = memory::remember(
        &session.store,
        category,
        file.as_deref(),
        text,
        session.branch(),
        now().naive_utc(),
    )?;
    println!("✅ REMEMBERED ({}) → .context/{}", category.as_str(), target);
    println!("  \"{}\"", text.trim());

    let hash = session
        .config
        .maybe_auto_commit(&session.git, &format!("remember {}", category.as_str()))?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn lesson(
    text: &str,
    problem: Option<&str>,
    resolution: Option<&str>,
    tags: Option<&str>,
) -> Result<()> {
    let lesson = Lesson::from_input(text, problem, resolution, tags)?;
    let session = Session::open()?;
    let _lock = session.lock()?;
    let target = memory::lesson(&session.store, &lesson, session.branch(), now().naive_utc())?;

    let branch = if session.branch() == agent_mem_core::branch::DEFAULT_BRANCH {
        String::new()
    } else {
        format!(" [branch: {}]", session.branch())
    };
    println!("✅ LESSON{branch} → .context/{target}");
    println!("  \"{}\"", lesson.title);

    let hash = session.config.maybe_auto_commit(&session.git, "lesson learned")?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn read(path: &str) -> Result<()> {
    let session = Session::open()?;
    let content = session
        .store
        .read(&session.store.normalize_visible(path)?)?
        .ok_or_else(|| MemError::NotFound(format!(".context/{path}")))?;
    println!("{content}");
    Ok(())
}

pub fn write(path: &str, content: Option<String>) -> Result<()> {
    let content = content_or_stdin(content, "content")?;
    let session = Session::open()?;
    let _lock = session.lock()?;
    let (written, existed) = memory::write(&session.store, path, &content)?;

    let verb = if existed { "UPDATED" } else { "CREATED" };
    println!(
        "✅ {verb}: .context/{written} ({} chars)",
        content.chars().count()
    );
    let hash = session
        .config
        .maybe_auto_commit(&session.git, &format!("write {written}"))?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn search(query: &str) -> Result<()> {
    let session = Session::open()?;
    let hits = memory::search(&session.store, query)?;
    println!("{}", render::search(query.trim(), &hits));
    Ok(())
}

pub fn forget(path: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let normalized = session.store.normalize_visible(path)?;
    let archived = memory::forget(&session.store, &normalized, now().date_naive())?;
    let hash = session.git.commit(&format!("forget: removed {normalized}"))?;

    println!("🗑️  FORGOT: {normalized}");
    println!("Archived: .context/{archived}");
    print_commit("Committed", hash.as_deref());
    println!();
    println!("To restore: amem read {archived}");
    Ok(())
}

pub fn pin(path: &str) -> Result<()> {
    let session = Session::open()?;
    if path.starts_with("system/") {
        println!("ℹ️  Already pinned (in system/).");
        return Ok(());
    }
    let _lock = session.lock()?;
    let (from, to) = memory::pin(&session.store, path)?;
    println!("📌 PINNED: {from} → {to}");
    println!("This file will now always be included in agent context.");
    let hash = session.config.maybe_auto_commit(&session.git, &format!("pin {to}"))?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

pub fn unpin(path: &str) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    let (from, to) = memory::unpin(&session.store, path)?;
    println!("📌 UNPINNED: {from} → {to}");
    println!("File moved to memory/. It will show in the tree but not be auto-loaded.");
    let hash = session.config.maybe_auto_commit(&session.git, &format!("unpin {from}"))?;
    print_commit("Committed", hash.as_deref());
    Ok(())
}

/// Parse the category flag set into a single category.
pub fn category_from_flags(decision: bool, pattern: bool, mistake: bool) -> Category {
    match (decision, pattern, mistake) {
        (true, _, _) => Category::Decision,
        (_, true, _) => Category::Pattern,
        (_, _, true) => Category::Mistake,
        _ => Category::Note,
    }
}

pub fn require_text(words: &[String], usage: &str) -> Result<String> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        return Err(anyhow!("Usage: {usage}"));
    }
    Ok(text)
}
