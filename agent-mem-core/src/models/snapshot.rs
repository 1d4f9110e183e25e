use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot envelope version. Imports reject anything else.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Portable export of a context directory for moving it between machines.
///
/// `files` maps each context-relative path to its full content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    pub version: u32,
    pub project: String,
    pub branch: String,
    pub commits: usize,
    pub last_commit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub files: BTreeMap<String, String>,
}
