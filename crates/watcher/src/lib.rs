//! File readiness watching for Quietwatch
//!
//! This crate turns a noisy stream of directory change notifications into one
//! "file ready" signal per write burst:
//! - Per-file quiet-period trackers with adaptive thresholds
//! - A single deadline scheduler shared by all trackers
//! - Extension and name-pattern filtering
//! - Recursive directory watching via `notify`

pub mod dispatcher;
pub mod evict;
pub mod filter;
pub mod scheduler;
pub mod source;
pub mod tracker;

pub use dispatcher::{Routing, WatchDispatcher};
pub use filter::NotificationFilter;
pub use source::NotificationSource;
pub use tracker::{ChangeOutcome, QuietPeriodTracker, TrackerOutput, TrackerSettings, TrackerState};

use std::path::PathBuf;
use tokio::time::Instant;

/// Raw change notification from the directory source
#[derive(Debug, Clone)]
pub struct RawNotification {
    /// Path relative to the watched root, used as the registry key
    pub name: String,
    /// Absolute path that changed
    pub full_path: PathBuf,
    /// Type of change
    pub kind: ChangeKind,
    /// When the change was observed
    pub changed_at: Instant,
}

/// Type of file system change
///
/// Both kinds are routed identically; the distinction only shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File created
    Created,
    /// File content or metadata modified
    Modified,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
        }
    }
}
