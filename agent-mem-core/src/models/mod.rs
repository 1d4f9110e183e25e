//! Domain models for agent-mem.
//!
//! # Core Concepts
//!
//! - [`Entry`]: one timestamped fact. Either a single bullet line
//!   (`- [2026-01-01 10:00] text`) or a multi-line block opened by a heading
//!   (`### [2026-01-01 10:00] title`), which is how lessons are stored.
//! - [`MemoryFile`]: a front-matter header followed by ordered entries. The
//!   header is always preserved verbatim when entries are rewritten.
//! - [`Category`]: which memory file an entry belongs to.
//! - [`ReflectionState`]: the breadcrumb linking `reflect gather` to `reflect save`.
//! - [`SnapshotEnvelope`]: portable JSON export of a whole context directory.
//!
//! Pinned files are not a separate type: a file is pinned because it lives
//! under `system/`.

mod entry;
mod memory_file;
mod reflection;
mod snapshot;

pub use entry::*;
pub use memory_file::*;
pub use reflection::*;
pub use snapshot::*;
