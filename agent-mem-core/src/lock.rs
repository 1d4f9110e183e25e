//! Advisory lock over a context directory.
//!
//! The lock never blocks: most writes are appends, so a live lock held by
//! another invocation only produces a warning. It exists so concurrent runs
//! are visible, and it is always released when the guard drops.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub const LOCK_FILE: &str = ".context.lock";

/// Locks older than this are treated as abandoned.
pub const LOCK_TIMEOUT_MS: i64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockRecord {
    pub pid: u32,
    pub holder: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// What was found when acquiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contention {
    None,
    /// An expired lock was removed.
    Reclaimed,
    /// Unreadable lock record, discarded.
    Corrupt,
    /// Another holder's lock is still live; we proceed anyway.
    Live { pid: u32, age_ms: i64 },
}

/// Guard holding `.context.lock` until dropped.
#[derive(Debug)]
pub struct ContextLock {
    path: PathBuf,
    holder: String,
    contention: Contention,
}

impl ContextLock {
    /// Take the lock for `project_root`, writing a fresh record.
    pub fn acquire(project_root: &Path) -> Result<Self> {
        Self::acquire_at(project_root, Utc::now().timestamp_millis())
    }

    /// Same as [`ContextLock::acquire`] with an explicit clock.
    pub fn acquire_at(project_root: &Path, now_ms: i64) -> Result<Self> {
        let path = project_root.join(LOCK_FILE);
        let contention = inspect(&path, now_ms);

        match &contention {
            Contention::None => {}
            Contention::Reclaimed => tracing::debug!("Reclaimed abandoned lock at {}", path.display()),
            Contention::Corrupt => tracing::warn!("Discarded corrupt lock record at {}", path.display()),
            Contention::Live { pid, age_ms } => tracing::warn!(
                "Context locked by PID {} ({}s ago), proceeding anyway",
                pid,
                age_ms / 1000
            ),
        }

        let record = LockRecord {
            pid: std::process::id(),
            holder: Uuid::new_v4().to_string(),
            timestamp: now_ms,
        };
        fs::write(&path, serde_json::to_string(&record)?)?;

        Ok(Self {
            path,
            holder: record.holder,
            contention,
        })
    }

    pub fn contention(&self) -> &Contention {
        &self.contention
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

fn inspect(path: &Path, now_ms: i64) -> Contention {
    let Ok(raw) = fs::read_to_string(path) else {
        return Contention::None;
    };
    match serde_json::from_str::<LockRecord>(&raw) {
        Ok(record) => {
            let age_ms = now_ms - record.timestamp;
            if age_ms > LOCK_TIMEOUT_MS {
                let _ = fs::remove_file(path);
                Contention::Reclaimed
            } else {
                Contention::Live {
                    pid: record.pid,
                    age_ms,
                }
            }
        }
        Err(_) => {
            let _ = fs::remove_file(path);
            Contention::Corrupt
        }
    }
}

impl Drop for ContextLock {
    fn drop(&mut self) {
        // Only remove the file if a later invocation has not overwritten it.
        let ours = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<LockRecord>(&raw).ok())
            .is_some_and(|record| record.holder == self.holder);
        if ours {
            let _ = fs::remove_file(&self.path);
        }
    }
}
