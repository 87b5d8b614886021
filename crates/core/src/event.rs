//! Output events produced by a watch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// A file that has stopped changing for its quiet period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyResult {
    /// Registry key (path relative to the watched root)
    pub file_name: String,
    /// Last known absolute path for the key
    pub full_path: PathBuf,
    /// Seconds between the last change notification and the ready signal
    pub seconds_since_last_update: f64,
    /// Tracker that produced this result, for log correlation
    pub tracker_id: Uuid,
    /// Wall-clock time the result was produced
    pub ready_at: DateTime<Utc>,
}

impl fmt::Display for ReadyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ready ({:.1}s since last update)",
            self.file_name, self.seconds_since_last_update
        )
    }
}

/// Everything a subscriber of a watch receives
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A file stabilized
    Ready(ReadyResult),
    /// Free-form diagnostic text
    Message(String),
}

impl WatchEvent {
    /// Ready result carried by this event, if any
    pub fn as_ready(&self) -> Option<&ReadyResult> {
        match self {
            WatchEvent::Ready(result) => Some(result),
            WatchEvent::Message(_) => None,
        }
    }
}
