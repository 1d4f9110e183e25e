use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Breadcrumb written by `reflect gather` and completed by `reflect save`.
///
/// This is the single record of how far reflection has progressed: the next
/// gather starts from `last_commit_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReflectionState {
    pub window_start: String,
    pub window_end: String,
    pub commits_reviewed: usize,
    pub last_commit_hash: Option<String>,
    pub since_ref: Option<String>,
    pub gathered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_file: Option<String>,
}

/// A reflection file as listed by `reflect history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionSummary {
    pub file: String,
    pub date: String,
    pub commits_reviewed: Option<usize>,
    pub gaps_filled: Option<usize>,
    pub stale_flagged: Option<usize>,
    pub summary: Option<String>,
}
