//! Per-file quiet-period detection
//!
//! A tracker decides when one file has stopped changing. Every change
//! notification re-arms its deadline; when a deadline elapses without being
//! superseded the tracker goes idle and emits a ready result. A file touched
//! again shortly after its ready signal is treated as the same delivery and its
//! quiet period grows by the idle gap plus a fixed padding.
//!
//! ```text
//! Pending --deadline elapses--> Idle --notification--> Pending
//!    ^                                                    |
//!    +------------------- notification (reset) -----------+
//! ```

use crate::scheduler::SchedulerHandle;
use chrono::Utc;
use parking_lot::Mutex;
use qw_core::{Error, ReadyResult, Result, WatchConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Thresholds a tracker is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Quiet period for a freshly seen file
    pub initial_quiet_period: Duration,
    /// Largest idle gap still counted as the same batch
    pub batch_gap_threshold: Duration,
    /// Added to the quiet period each time a batch resumes
    pub padding: Duration,
}

impl TrackerSettings {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            initial_quiet_period: config.initial_quiet_period(),
            batch_gap_threshold: config.batch_gap_threshold(),
            padding: config.threshold_padding(),
        }
    }
}

/// Tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No deadline armed
    Idle,
    /// A deadline is armed and waiting to elapse uninterrupted
    Pending,
}

/// What a change notification did to a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Still in the same write burst; deadline pushed back
    Reset,
    /// Same delivery resumed after a ready signal; quiet period grew
    Extended { gap: Duration, quiet_threshold: Duration },
    /// Filename reused by a new delivery; quiet period kept as is
    NewBatch { gap: Duration },
}

/// Values a tracker emits to its owner
#[derive(Debug, Clone)]
pub enum TrackerOutput {
    Ready(ReadyResult),
    Message(String),
}

/// Mutable tracker state, guarded by the tracker's own lock
struct Inner {
    full_path: PathBuf,
    state: TrackerState,
    quiet_threshold: Duration,
    last_event_time: Instant,
    /// When the last ready result was emitted, while idle
    idle_since: Option<Instant>,
    /// Bumped on every arm; a firing with an older generation is stale
    generation: u64,
}

/// Readiness state machine for one file key
pub struct QuietPeriodTracker {
    key: String,
    id: Uuid,
    batch_gap_threshold: Duration,
    padding: Duration,
    scheduler: SchedulerHandle,
    output: mpsc::UnboundedSender<TrackerOutput>,
    inner: Mutex<Inner>,
}

impl QuietPeriodTracker {
    /// Create a tracker in `Pending` with its first deadline armed
    pub fn create(
        key: impl Into<String>,
        full_path: PathBuf,
        settings: &TrackerSettings,
        now: Instant,
        scheduler: SchedulerHandle,
        output: mpsc::UnboundedSender<TrackerOutput>,
    ) -> Result<Arc<Self>> {
        let tracker = Arc::new(Self {
            key: key.into(),
            id: Uuid::new_v4(),
            batch_gap_threshold: settings.batch_gap_threshold,
            padding: settings.padding,
            scheduler,
            output,
            inner: Mutex::new(Inner {
                full_path,
                state: TrackerState::Pending,
                quiet_threshold: settings.initial_quiet_period,
                last_event_time: now,
                idle_since: None,
                generation: 0,
            }),
        });

        let deadline = tracker.deadline_after(now, settings.initial_quiet_period)?;
        tracker.scheduler.arm(Arc::clone(&tracker), 0, deadline)?;

        debug!(
            "tracking {} (id {}, quiet period {}s)",
            tracker.key,
            tracker.id,
            settings.initial_quiet_period.as_secs_f64()
        );
        Ok(tracker)
    }

    /// Apply a change notification observed at `event_time`
    ///
    /// While pending the deadline is pushed back to `event_time + quiet period`.
    /// While idle the gap since the ready signal decides between growing the
    /// quiet period (same batch) and keeping it (new batch); either way a fresh
    /// deadline is armed.
    pub fn on_change_notification(
        self: &Arc<Self>,
        full_path: &Path,
        event_time: Instant,
    ) -> Result<ChangeOutcome> {
        let outcome = {
            let mut inner = self.inner.lock();

            // Out-of-order deliveries never pull the deadline earlier
            let event_time = event_time.max(inner.last_event_time);
            let gap = event_time
                .saturating_duration_since(inner.idle_since.unwrap_or(inner.last_event_time));

            let (outcome, quiet_threshold) = match inner.state {
                TrackerState::Pending => (ChangeOutcome::Reset, inner.quiet_threshold),
                TrackerState::Idle if gap <= self.batch_gap_threshold => {
                    let grown = inner
                        .quiet_threshold
                        .checked_add(gap)
                        .and_then(|d| d.checked_add(self.padding))
                        .ok_or_else(|| self.overflow("quiet period"))?;
                    (
                        ChangeOutcome::Extended {
                            gap,
                            quiet_threshold: grown,
                        },
                        grown,
                    )
                }
                TrackerState::Idle => (ChangeOutcome::NewBatch { gap }, inner.quiet_threshold),
            };

            let deadline = self.deadline_after(event_time, quiet_threshold)?;
            let generation = inner.generation + 1;
            self.scheduler.arm(Arc::clone(self), generation, deadline)?;

            inner.generation = generation;
            inner.state = TrackerState::Pending;
            inner.idle_since = None;
            inner.quiet_threshold = quiet_threshold;
            inner.last_event_time = event_time;
            inner.full_path = full_path.to_path_buf();
            outcome
        };

        match outcome {
            ChangeOutcome::Reset => trace!("{} still changing, deadline reset", self.key),
            ChangeOutcome::Extended {
                gap,
                quiet_threshold,
            } => self.emit_message(format!(
                "{} resumed after {:.0}s, quiet period extended to {:.0}s",
                self.key,
                gap.as_secs_f64(),
                quiet_threshold.as_secs_f64()
            )),
            ChangeOutcome::NewBatch { .. } => {
                self.emit_message(format!("{} restarting count again", self.key))
            }
        }

        Ok(outcome)
    }

    /// Handle an elapsed deadline armed with `generation`
    ///
    /// Returns true when a ready result was emitted. A firing that lost a race
    /// against a newer notification is ignored.
    pub fn on_deadline_elapsed(&self, generation: u64, now: Instant) -> bool {
        let mut inner = self.inner.lock();

        if inner.state != TrackerState::Pending || inner.generation != generation {
            trace!(
                "stale deadline for {} (generation {}, current {})",
                self.key,
                generation,
                inner.generation
            );
            return false;
        }

        inner.state = TrackerState::Idle;
        inner.idle_since = Some(now);

        let result = ReadyResult {
            file_name: self.key.clone(),
            full_path: inner.full_path.clone(),
            seconds_since_last_update: now
                .saturating_duration_since(inner.last_event_time)
                .as_secs_f64(),
            tracker_id: self.id,
            ready_at: Utc::now(),
        };

        // Emitted under the lock so a concurrent notification is ordered after it
        if let Err(e) = self.output.send(TrackerOutput::Ready(result)) {
            let err = Error::DeadlineCallback {
                key: self.key.clone(),
                reason: e.to_string(),
            };
            error!("{}", err);
            return false;
        }

        true
    }

    /// True when idle for at least `max_idle` since the last ready result
    pub fn is_evictable(&self, now: Instant, max_idle: Duration) -> bool {
        let inner = self.inner.lock();
        match (inner.state, inner.idle_since) {
            (TrackerState::Idle, Some(since)) => now.saturating_duration_since(since) >= max_idle,
            _ => false,
        }
    }

    fn deadline_after(&self, from: Instant, quiet: Duration) -> Result<Instant> {
        from.checked_add(quiet)
            .ok_or_else(|| self.overflow("deadline"))
    }

    fn overflow(&self, what: &str) -> Error {
        Error::NotificationHandling {
            name: self.key.clone(),
            reason: format!("{} out of range", what),
        }
    }

    fn emit_message(&self, msg: String) {
        debug!("{}", msg);
        if self.output.send(TrackerOutput::Message(msg)).is_err() {
            trace!("tracker output closed, message for {} dropped", self.key);
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn full_path(&self) -> PathBuf {
        self.inner.lock().full_path.clone()
    }

    pub fn state(&self) -> TrackerState {
        self.inner.lock().state
    }

    /// Current quiet period; never decreases
    pub fn quiet_threshold(&self) -> Duration {
        self.inner.lock().quiet_threshold
    }

    pub fn last_event_time(&self) -> Instant {
        self.inner.lock().last_event_time
    }

    pub fn batch_gap_threshold(&self) -> Duration {
        self.batch_gap_threshold
    }
}

impl std::fmt::Debug for QuietPeriodTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("QuietPeriodTracker")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("quiet_threshold", &inner.quiet_threshold)
            .finish()
    }
}
