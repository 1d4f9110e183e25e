//! Memory lifecycle for agent-mem.
//!
//! # Layout on disk
//!
//! Everything lives under a project's `.context/` directory, which is its own
//! git repository:
//!
//! - `system/`: pinned files, always loaded into agent context.
//! - `memory/<category>.md`: categorized, append-only entries.
//! - `branches/<name>/`: sparse exploration namespaces (`purpose.md`,
//!   `commits.md`, `trace.md`, plus a `memory/` subtree of branch-local entries).
//! - `reflections/<date>[-n].md`: saved reflection cycles.
//! - `archive/<reason>-<date>/`: verbatim copies of compacted or forgotten content.
//! - `config.yaml` and the hidden `.reflect-state.json` breadcrumb.
//!
//! # Components
//!
//! - [`store`]: reads and writes context files, parses them into [`models::MemoryFile`]s.
//! - [`branch`]: maps logical branches onto `memory/` paths; create, switch, diff, merge.
//! - [`resolve`]: resolves git conflict markers per file class.
//! - [`compact`]: retention-based archival.
//! - [`defrag`]: oversized/duplicate/stale/structural diagnostics.
//! - [`reflect`]: the gather/save reflection loop and its history view.
//! - [`memory`] and [`context`]: the everyday commands built on the above.

pub mod branch;
pub mod compact;
pub mod config;
pub mod context;
pub mod defrag;
pub mod error;
pub mod lock;
pub mod memory;
pub mod models;
pub mod reflect;
pub mod resolve;
pub mod share;
pub mod store;
pub mod vcs;

pub use error::{MemError, Result};
