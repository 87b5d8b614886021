//! Deadline scheduling for quiet-period trackers
//!
//! One task owns a min-heap of armed deadlines for every tracker instead of one
//! timer per file. Re-arming a tracker pushes a new entry; the superseded entry
//! stays in the heap and is recognised as stale by its generation when it pops.

use crate::tracker::QuietPeriodTracker;
use qw_core::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Request to fire a tracker's deadline
struct Arm {
    tracker: Arc<QuietPeriodTracker>,
    generation: u64,
    deadline: Instant,
}

/// Heap entry, ordered so the earliest deadline is on top
struct Deadline {
    at: Instant,
    sequence: u64,
    generation: u64,
    tracker: Arc<QuietPeriodTracker>,
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier deadline first, then earlier arm
        match other.at.cmp(&self.at) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Cloneable handle used by trackers to arm deadlines
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Arm>,
}

impl SchedulerHandle {
    /// Ask the scheduler to call `on_deadline_elapsed(generation)` at `deadline`
    pub fn arm(
        &self,
        tracker: Arc<QuietPeriodTracker>,
        generation: u64,
        deadline: Instant,
    ) -> Result<()> {
        let key = tracker.key().to_string();
        self.tx
            .send(Arm {
                tracker,
                generation,
                deadline,
            })
            .map_err(|_| Error::NotificationHandling {
                name: key,
                reason: "deadline scheduler stopped".to_string(),
            })
    }
}

/// Scheduling loop owning every armed deadline
pub struct DeadlineScheduler {
    rx: mpsc::UnboundedReceiver<Arm>,
    heap: BinaryHeap<Deadline>,
    sequence: u64,
}

impl DeadlineScheduler {
    /// Create a scheduler and the handle that feeds it
    pub fn new() -> (SchedulerHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            rx,
            heap: BinaryHeap::new(),
            sequence: 0,
        };
        (SchedulerHandle { tx }, scheduler)
    }

    /// Run until every handle is dropped
    ///
    /// Deadlines still in the heap at that point are abandoned.
    pub async fn run(mut self) {
        loop {
            let next = self.heap.peek().map(|deadline| deadline.at);

            tokio::select! {
                arm = self.rx.recv() => match arm {
                    Some(arm) => self.push(arm),
                    None => break,
                },
                _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                    self.fire_due(Instant::now());
                }
            }
        }

        debug!("deadline scheduler stopped ({} deadlines abandoned)", self.heap.len());
    }

    fn push(&mut self, arm: Arm) {
        self.sequence += 1;
        self.heap.push(Deadline {
            at: arm.deadline,
            sequence: self.sequence,
            generation: arm.generation,
            tracker: arm.tracker,
        });
    }

    /// Fire every deadline at or before `now`
    fn fire_due(&mut self, now: Instant) {
        while self.heap.peek().is_some_and(|deadline| deadline.at <= now) {
            let Some(deadline) = self.heap.pop() else {
                break;
            };
            trace!(
                "deadline for {} (generation {}) elapsed",
                deadline.tracker.key(),
                deadline.generation
            );
            deadline.tracker.on_deadline_elapsed(deadline.generation, now);
        }
    }
}
