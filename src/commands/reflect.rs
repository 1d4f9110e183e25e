use anyhow::Result;

use agent_mem_core::defrag::{self, Thresholds};
use agent_mem_core::reflect::{self, GatherOptions, Gathered};

use super::{content_or_stdin, now, print_commit, Session};
use crate::render;

pub fn gather(options: GatherOptions) -> Result<()> {
    let session = Session::open()?;
    let _lock = session.lock()?;
    match reflect::gather(&session.store, &session.git, &options, now())? {
        Gathered::Empty { since } => {
            let since = since.as_deref().unwrap_or("the beginning");
            println!("✅ No new commits since {since}. Nothing to reflect on.");
        }
        Gathered::Prompt { prompt, .. } => println!("{prompt}"),
    }
    Ok(())
}

pub fn save(content: Option<String>) -> Result<()> {
    let text = content_or_stdin(content, "reflection")?;
    let session = Session::open()?;
    let _lock = session.lock()?;
    let outcome = reflect::save(&session.store, &session.git, &text, session.branch(), now())?;

    println!("✅ REFLECTION SAVED → .context/{}", outcome.file);
    if !outcome.recognized {
        println!("ℹ️  No known sections found; saved as free-form text.");
    }
    if !outcome.gaps.is_empty() {
        println!("Gaps filled ({}):", outcome.gaps.len());
        for (target, text) in &outcome.gaps {
            println!("  + {target}: {text}");
        }
    }
    if outcome.stale_flagged > 0 {
        println!("Stale entries flagged: {}", outcome.stale_flagged);
    }
    if let Some(summary) = &outcome.summary {
        println!("Summary: {summary}");
    }
    print_commit("Committed", outcome.commit.as_deref());
    Ok(())
}

pub fn history(limit: usize) -> Result<()> {
    let session = Session::open()?;
    let history = reflect::history(&session.store, limit)?;
    println!("{}", render::history(&history));
    Ok(())
}

pub fn defrag(dry_run: bool, apply: bool) -> Result<()> {
    let session = Session::open()?;
    let thresholds = Thresholds::from(&session.config.reflection);
    let today = now().date_naive();
    let report = defrag::analyze(&session.store, thresholds, today)?;
    println!("{}", render::defrag(&report, dry_run));

    if apply && !dry_run {
        let _lock = session.lock()?;
        let (marked, hash) = defrag::apply(&session.store, &session.git, &report, today)?;
        println!();
        println!("✅ Flagged {marked} stale entries");
        print_commit("Committed", hash.as_deref());
    }
    Ok(())
}
