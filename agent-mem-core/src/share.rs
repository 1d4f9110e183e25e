//! Portable snapshot export and import.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{MemError, Result};
use crate::models::{SnapshotEnvelope, SNAPSHOT_VERSION};
use crate::store::ContextStore;
use crate::vcs::Vcs;

/// Capture every non-hidden context file into an envelope.
pub fn export(
    store: &ContextStore,
    vcs: &dyn Vcs,
    project: &str,
    branch: &str,
    now: DateTime<Utc>,
) -> Result<SnapshotEnvelope> {
    let mut files = BTreeMap::new();
    for path in store.walk(None)? {
        match store.read(&path) {
            Ok(Some(content)) => {
                files.insert(path, content);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping {} in snapshot: {}", path, e),
        }
    }

    Ok(SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        project: project.to_string(),
        branch: branch.to_string(),
        commits: vcs.commit_count(None),
        last_commit: vcs.last_commit().map(|c| c.hash),
        created_at: now,
        files,
    })
}

pub fn to_json(envelope: &SnapshotEnvelope) -> Result<String> {
    Ok(serde_json::to_string_pretty(envelope)?)
}

/// `context-<project>-<first 8 hex of sha256(json)>.json`
pub fn file_name(project: &str, json: &str) -> String {
    let digest = hex::encode(Sha256::digest(json.as_bytes()));
    format!("context-{project}-{}.json", &digest[..8])
}

/// Parse and version-check an envelope.
pub fn parse(json: &str) -> Result<SnapshotEnvelope> {
    let envelope: SnapshotEnvelope = serde_json::from_str(json)
        .map_err(|e| MemError::InvalidInput(format!("Invalid snapshot file: {e}")))?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(MemError::InvalidInput(format!(
            "Unrecognized snapshot version {}",
            envelope.version
        )));
    }
    Ok(envelope)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub written: usize,
    pub skipped: usize,
    pub commit: Option<String>,
}

/// Write an envelope into the context and commit.
///
/// Overwrites by default; with `merge` only paths absent locally are written.
/// Every path is checked before anything is written.
pub fn import(
    store: &ContextStore,
    vcs: &dyn Vcs,
    envelope: &SnapshotEnvelope,
    merge: bool,
) -> Result<ImportOutcome> {
    let mut planned = Vec::with_capacity(envelope.files.len());
    for (path, content) in &envelope.files {
        planned.push((store.normalize_visible(path)?, content));
    }

    let mut written = 0;
    let mut skipped = 0;
    for (path, content) in planned {
        if merge && store.exists(&path)? {
            skipped += 1;
            continue;
        }
        store.write(&path, content)?;
        written += 1;
    }

    let created = envelope.created_at.format("%Y-%m-%d");
    let commit = vcs.commit(&format!("import: from {} ({created})", envelope.project))?;
    tracing::info!("Imported {} files ({} skipped)", written, skipped);
    Ok(ImportOutcome {
        written,
        skipped,
        commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_hash_prefix() {
        let name = file_name("demo", "{}");
        // sha256("{}") = 44136fa3...
        assert_eq!(name, "context-demo-44136fa3.json");
    }

    #[test]
    fn rejects_unknown_versions() {
        let json = r#"{"version":2,"project":"p","branch":"main","commits":0,"lastCommit":null,"createdAt":"2026-01-01T00:00:00Z","files":{}}"#;
        assert!(matches!(parse(json), Err(MemError::InvalidInput(_))));
        assert!(matches!(parse("not json"), Err(MemError::InvalidInput(_))));
    }
}
