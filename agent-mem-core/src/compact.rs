//! Retention-based compaction.
//!
//! Old memory entries and superseded reflections move into a dated archive
//! bundle; pinned files, branch metadata and config are never touched.

use chrono::{Duration, NaiveDate};

use crate::config::CONFIG_FILE;
use crate::error::Result;
use crate::models::{serialize_entries, Entry, MemoryFile};
use crate::reflect::reflection_files;
use crate::store::ContextStore;
use crate::vcs::Vcs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactMode {
    /// Keep entries inside the retention window and the latest reflection.
    #[default]
    Default,
    /// Keep pinned files only.
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptItem {
    pub path: String,
    /// Entries kept (memory files) or branches kept (`branches/`).
    pub count: Option<usize>,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedItem {
    pub path: String,
    /// `(dropped, kept)` entry counts for memory files.
    pub entries: Option<(usize, usize)>,
    pub reason: &'static str,
}

/// One memory file split by the retention policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePartition {
    pub path: String,
    pub header: String,
    pub retained: Vec<Entry>,
    pub dropped: Vec<Entry>,
}

impl FilePartition {
    /// Live file content after compaction. Stale markers do not survive.
    pub fn rewritten(&self) -> String {
        serialize_entries(&self.header, self.retained.iter())
    }
}

/// Everything compaction would do, computed without touching the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactPlan {
    pub mode: CompactMode,
    pub today: NaiveDate,
    pub kept: Vec<KeptItem>,
    pub archived: Vec<ArchivedItem>,
    pub partitions: Vec<FilePartition>,
    pub reflections: Vec<String>,
    pub before_bytes: u64,
    pub projected_bytes: u64,
}

impl CompactPlan {
    pub fn archive_dir(&self) -> String {
        format!("archive/compact-{}", self.today.format("%Y-%m-%d"))
    }

    pub fn is_empty(&self) -> bool {
        self.archived.is_empty()
    }
}

/// The date `days` days before `today`, clamped to the earliest
/// representable date when the window reaches past it.
pub fn days_before(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|window| today.checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN)
}

/// Split entries into (retained, dropped). Hard mode retains nothing.
pub fn partition(
    entries: Vec<Entry>,
    mode: CompactMode,
    retain_days: i64,
    today: NaiveDate,
) -> (Vec<Entry>, Vec<Entry>) {
    let cutoff = days_before(today, retain_days);
    entries.into_iter().partition(|e| match mode {
        CompactMode::Hard => false,
        CompactMode::Default => e.date() >= cutoff,
    })
}

fn without_markers(mut entries: Vec<Entry>) -> Vec<Entry> {
    for entry in &mut entries {
        entry.stale_markers.clear();
    }
    entries
}

/// Work out what compaction would keep and archive.
pub fn plan(
    store: &ContextStore,
    mode: CompactMode,
    retain_days: i64,
    today: NaiveDate,
) -> Result<CompactPlan> {
    let before_bytes = store.live_bytes()?;
    let mut saved: u64 = 0;
    let mut kept = Vec::new();
    let mut archived = Vec::new();
    let mut partitions = Vec::new();

    for path in store.walk(Some("system"))? {
        kept.push(KeptItem {
            path,
            count: None,
            reason: "pinned",
        });
    }

    for path in store.list_markdown("memory")? {
        let Some(content) = store.read(&path)? else {
            continue;
        };
        let file = MemoryFile::parse(path.as_str(), &content);
        let (retained, dropped) = partition(file.entries, mode, retain_days, today);
        tracing::debug!("{}: keep {}, drop {}", path, retained.len(), dropped.len());

        if !retained.is_empty() {
            kept.push(KeptItem {
                path: path.clone(),
                count: Some(retained.len()),
                reason: match mode {
                    CompactMode::Hard => "n/a",
                    CompactMode::Default => "recent",
                },
            });
        }
        if dropped.is_empty() {
            continue;
        }

        archived.push(ArchivedItem {
            path: path.clone(),
            entries: Some((dropped.len(), retained.len())),
            reason: match mode {
                CompactMode::Hard => "hard mode",
                CompactMode::Default => "older than retain window",
            },
        });
        let partition = FilePartition {
            path,
            header: file.header,
            retained: without_markers(retained),
            dropped: without_markers(dropped),
        };
        saved += (content.len() as u64).saturating_sub(partition.rewritten().len() as u64);
        partitions.push(partition);
    }

    let reflections = reflection_files(store)?;
    let keep_count = match mode {
        CompactMode::Hard => 0,
        CompactMode::Default => 1,
    };
    let split = reflections.len().saturating_sub(keep_count);
    let (old, latest) = reflections.split_at(split);
    for path in latest {
        kept.push(KeptItem {
            path: path.clone(),
            count: None,
            reason: "latest reflection",
        });
    }
    for path in old {
        saved += store.file_size(path)?;
        archived.push(ArchivedItem {
            path: path.clone(),
            entries: None,
            reason: "older reflection",
        });
    }

    let branches = store.list_dirs("branches")?;
    if !branches.is_empty() {
        kept.push(KeptItem {
            path: "branches/".to_string(),
            count: Some(branches.len()),
            reason: "branch metadata",
        });
    }
    if store.exists(CONFIG_FILE)? {
        kept.push(KeptItem {
            path: CONFIG_FILE.to_string(),
            count: None,
            reason: "configuration",
        });
    }

    Ok(CompactPlan {
        mode,
        today,
        kept,
        archived,
        partitions,
        reflections: old.to_vec(),
        before_bytes,
        projected_bytes: before_bytes.saturating_sub(saved),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactReport {
    pub plan: CompactPlan,
    pub dry_run: bool,
    pub checkpoint: Option<String>,
    pub commit: Option<String>,
    pub after_bytes: u64,
}

/// Carry out a plan: checkpoint, archive, rewrite, commit.
pub fn apply(store: &ContextStore, vcs: &dyn Vcs, plan: CompactPlan) -> Result<CompactReport> {
    let checkpoint = if vcs.has_changes() {
        vcs.commit("compact: pre-compact checkpoint")?
    } else {
        None
    };

    let archive_dir = plan.archive_dir();
    for partition in &plan.partitions {
        let bundle = format!("{archive_dir}/{}", partition.path);
        store.append_entries(&bundle, &partition.dropped, &partition.header)?;
        store.write(&partition.path, &partition.rewritten())?;
    }
    for path in &plan.reflections {
        store.rename(path, &format!("{archive_dir}/{path}"))?;
    }

    let commit = if plan.is_empty() {
        None
    } else {
        let n = plan.archived.len();
        let message = match plan.mode {
            CompactMode::Hard => format!("compact --hard: archived {n} items, kept pins only"),
            CompactMode::Default => format!("compact: archived {n} items, kept recent + pins"),
        };
        vcs.commit(&message)?
    };

    let after_bytes = store.live_bytes()?;
    tracing::info!(
        "Compacted {} items ({} -> {} bytes)",
        plan.archived.len(),
        plan.before_bytes,
        after_bytes
    );
    Ok(CompactReport {
        plan,
        dry_run: false,
        checkpoint,
        commit,
        after_bytes,
    })
}

/// Plan and, unless `dry_run`, apply compaction.
pub fn compact(
    store: &ContextStore,
    vcs: &dyn Vcs,
    mode: CompactMode,
    retain_days: i64,
    today: NaiveDate,
    dry_run: bool,
) -> Result<CompactReport> {
    let plan = plan(store, mode, retain_days, today)?;
    if dry_run {
        let after_bytes = plan.projected_bytes;
        return Ok(CompactReport {
            plan,
            dry_run: true,
            checkpoint: None,
            commit: None,
            after_bytes,
        });
    }
    apply(store, vcs, plan)
}
