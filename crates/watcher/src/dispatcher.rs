//! Watch dispatcher: filter, route, fan out
//!
//! Owns the filename -> tracker registry. Raw notifications are filtered,
//! routed to the tracker for their name (created on first sight), and every
//! tracker output is republished to subscribers as a `WatchEvent`.
//!
//! ```text
//! source -> handle_notification -> filter -> registry -> tracker
//!                                                          |
//! subscribers <- broadcast <- pump <- tracker output <-----+
//! ```

use crate::evict::IdleEvictor;
use crate::filter::NotificationFilter;
use crate::scheduler::{DeadlineScheduler, SchedulerHandle};
use crate::source::NotificationSource;
use crate::tracker::{ChangeOutcome, QuietPeriodTracker, TrackerOutput, TrackerSettings};
use crate::RawNotification;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use qw_core::{Error, ReadyResult, Result, WatchConfig, WatchEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 1024;

/// How a notification was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Rejected by the name pattern or extension filter
    Filtered,
    /// First sight of the name; a tracker was created
    Created,
    /// Forwarded to the existing tracker
    Forwarded(ChangeOutcome),
}

/// Republishes tracker output to external subscribers
#[derive(Clone)]
struct Outlet {
    events: broadcast::Sender<WatchEvent>,
    log_ready_events: bool,
}

impl Outlet {
    fn publish_ready(&self, result: ReadyResult) {
        if self.log_ready_events {
            info!("file {} ready", result.file_name);
        } else {
            debug!("file {} ready", result.file_name);
        }
        self.publish(WatchEvent::Ready(result));
    }

    fn publish_message(&self, msg: String) {
        self.publish(WatchEvent::Message(msg));
    }

    fn publish(&self, event: WatchEvent) {
        // No subscribers is not an error; the event just has nowhere to go
        if self.events.send(event).is_err() {
            trace!("no watch subscribers, event dropped");
        }
    }
}

/// Registry of quiet-period trackers for one watched tree
pub struct WatchDispatcher {
    root: PathBuf,
    filter: NotificationFilter,
    settings: TrackerSettings,
    log_raw_notifications: bool,
    registry: DashMap<String, Arc<QuietPeriodTracker>>,
    scheduler: SchedulerHandle,
    tracker_tx: mpsc::UnboundedSender<TrackerOutput>,
    outlet: Outlet,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WatchDispatcher {
    /// Validate the config and spawn the scheduling tasks
    ///
    /// Tasks are spawned on the current Tokio runtime; without one this fails
    /// with `Error::Runtime`. Fails without starting anything when the root
    /// path, the extension set, or a required name pattern is missing.
    pub fn configure(config: &WatchConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let filter = NotificationFilter::from_config(config)?;
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;

        let (scheduler, deadline_loop) = DeadlineScheduler::new();
        let (tracker_tx, tracker_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let outlet = Outlet {
            events,
            log_ready_events: config.log_ready_events,
        };

        let dispatcher = Arc::new(Self {
            root: config.root_path.clone(),
            filter,
            settings: TrackerSettings::from_config(config),
            log_raw_notifications: config.log_raw_notifications,
            registry: DashMap::new(),
            scheduler,
            tracker_tx,
            outlet: outlet.clone(),
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = vec![
            runtime.spawn(deadline_loop.run()),
            runtime.spawn(pump(tracker_rx, outlet)),
        ];
        if let Some(max_idle) = config.evict_idle_after() {
            let evictor = IdleEvictor::new(Arc::downgrade(&dispatcher), max_idle);
            tasks.push(runtime.spawn(evictor.run()));
        }
        dispatcher.tasks.lock().extend(tasks);

        info!("{}", config.summary());
        Ok(dispatcher)
    }

    /// Subscribe to ready results and diagnostic messages
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.outlet.events.subscribe()
    }

    /// Start watching the root directory recursively
    ///
    /// Notifications flow into `dispatch` until the returned source is
    /// stopped or dropped.
    pub fn start(self: &Arc<Self>) -> Result<NotificationSource> {
        let source = NotificationSource::spawn(&self.root, Arc::clone(self))?;

        let msg = format!("Watching folder: {}", self.root.display());
        info!("{}", msg);
        self.outlet.publish_message(msg);
        Ok(source)
    }

    /// Route a raw notification, logging and dropping it on failure
    pub fn dispatch(&self, notification: RawNotification) {
        trace!(
            "raw {} {}",
            notification.kind.label(),
            notification.full_path.display()
        );

        if let Err(e) = self.handle_notification(
            &notification.name,
            &notification.full_path,
            notification.changed_at,
        ) {
            warn!("{}", e);
        }
    }

    /// Filter a notification and hand it to the tracker for `name`
    ///
    /// The first notification for a name creates its tracker; the registry
    /// entry API makes that creation atomic, so concurrent first sightings of
    /// the same name produce exactly one tracker.
    pub fn handle_notification(
        &self,
        name: &str,
        full_path: &Path,
        changed_at: Instant,
    ) -> Result<Routing> {
        if !self.filter.accepts(name, full_path) {
            return Ok(Routing::Filtered);
        }

        if self.log_raw_notifications {
            info!("change: name: {:<50} path: {}", name, full_path.display());
        }

        match self.registry.entry(name.to_string()) {
            // Applied under the shard guard so an eviction sweep cannot drop
            // the tracker between lookup and update
            Entry::Occupied(entry) => {
                let outcome = entry.get().on_change_notification(full_path, changed_at)?;
                Ok(Routing::Forwarded(outcome))
            }
            Entry::Vacant(entry) => {
                let tracker = QuietPeriodTracker::create(
                    name,
                    full_path.to_path_buf(),
                    &self.settings,
                    changed_at,
                    self.scheduler.clone(),
                    self.tracker_tx.clone(),
                )?;
                entry.insert(tracker);
                Ok(Routing::Created)
            }
        }
    }

    /// Republish a tracker's ready result to subscribers
    pub fn on_tracker_ready(&self, result: ReadyResult) {
        self.outlet.publish_ready(result);
    }

    /// Republish a tracker's diagnostic message unchanged
    pub fn on_tracker_message(&self, msg: String) {
        self.outlet.publish_message(msg);
    }

    /// Drop idle trackers whose ready signal is older than `max_idle`
    ///
    /// Returns the number of trackers removed. Pending trackers are kept.
    pub fn evict_idle(&self, now: Instant, max_idle: Duration) -> usize {
        let mut evicted = 0;
        self.registry.retain(|name, tracker| {
            let evict = tracker.is_evictable(now, max_idle);
            if evict {
                trace!("evicting idle tracker {}", name);
                evicted += 1;
            }
            !evict
        });
        evicted
    }

    pub fn tracker(&self, name: &str) -> Option<Arc<QuietPeriodTracker>> {
        self.registry.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn tracker_count(&self) -> usize {
        self.registry.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop the scheduling tasks; armed deadlines are abandoned
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        debug!("dispatcher for {} shut down", self.root.display());
    }
}

/// Forward tracker output to subscribers until every tracker is gone
async fn pump(mut rx: mpsc::UnboundedReceiver<TrackerOutput>, outlet: Outlet) {
    while let Some(output) = rx.recv().await {
        match output {
            TrackerOutput::Ready(result) => outlet.publish_ready(result),
            TrackerOutput::Message(msg) => outlet.publish_message(msg),
        }
    }
}
