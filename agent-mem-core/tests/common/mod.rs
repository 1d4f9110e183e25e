#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use agent_mem_core::store::ContextStore;
use agent_mem_core::vcs::{CommitInfo, FileStat, Vcs};
use agent_mem_core::Result;
use tempfile::TempDir;

/// In-memory [`Vcs`] that records commits instead of running git.
#[derive(Default)]
pub struct RecordingVcs {
    /// Newest first, like `git log`.
    pub log: RefCell<Vec<CommitInfo>>,
    pub dirty: Cell<bool>,
    pub stats: RefCell<Vec<FileStat>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate history, oldest first.
    pub fn with_history(messages: &[&str]) -> Self {
        let vcs = Self::new();
        for message in messages {
            vcs.push(message);
        }
        vcs
    }

    fn push(&self, message: &str) -> String {
        let mut log = self.log.borrow_mut();
        let n = log.len();
        let hash = format!("c{:03}", n + 1);
        let commit = CommitInfo {
            hash: hash.clone(),
            message: message.to_string(),
            date: format!("2026-03-{:02}T10:00:00+00:00", (n % 28) + 1),
        };
        log.insert(0, commit);
        hash
    }

    /// Commit messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.log.borrow().iter().rev().map(|c| c.message.clone()).collect()
    }

    pub fn last_message(&self) -> Option<String> {
        self.log.borrow().first().map(|c| c.message.clone())
    }

    fn since_index(&self, since: Option<&str>) -> usize {
        let log = self.log.borrow();
        match since {
            Some(rev) => log.iter().position(|c| c.hash == rev).unwrap_or(log.len()),
            None => log.len(),
        }
    }
}

impl Vcs for RecordingVcs {
    fn commit(&self, message: &str) -> Result<Option<String>> {
        self.dirty.set(false);
        Ok(Some(self.push(message)))
    }

    fn has_changes(&self) -> bool {
        self.dirty.get()
    }

    fn commit_count(&self, since: Option<&str>) -> usize {
        self.since_index(since)
    }

    fn log(&self, since: Option<&str>, max: usize) -> Result<Vec<CommitInfo>> {
        let n = self.since_index(since).min(max);
        Ok(self.log.borrow()[..n].to_vec())
    }

    fn diff_stat(&self, _since: &str) -> Result<Vec<FileStat>> {
        Ok(self.stats.borrow().clone())
    }

    fn diff_text(&self, _since: &str, _path: &str) -> Result<String> {
        Ok(String::new())
    }

    fn first_commit(&self) -> Option<CommitInfo> {
        self.log.borrow().last().cloned()
    }

    fn last_commit(&self) -> Option<CommitInfo> {
        self.log.borrow().first().cloned()
    }
}

/// A temporary project with an initialised `.context/`.
pub fn context() -> (TempDir, ContextStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = ContextStore::for_project(dir.path());
    let today = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
    agent_mem_core::context::init(&store, "demo", false, today).expect("Failed to init context");
    (dir, store)
}

pub fn date(s: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}

pub fn at(s: &str) -> chrono::NaiveDateTime {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid datetime")
}

pub fn utc(s: &str) -> chrono::DateTime<chrono::Utc> {
    at(s).and_utc()
}
