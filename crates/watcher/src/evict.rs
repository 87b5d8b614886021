//! Periodic idle-tracker eviction
//!
//! Trackers otherwise live for the whole process, so a long-running watch of a
//! high-churn directory grows without bound. When `evict_idle_after_secs` is
//! set, this loop drops trackers that have been idle that long. A file seen
//! again after eviction starts over with the initial quiet period.

use crate::dispatcher::WatchDispatcher;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Shortest interval between eviction sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic idle-tracker evictor
pub struct IdleEvictor {
    /// Dispatcher whose registry is swept; the loop ends once it is dropped
    dispatcher: Weak<WatchDispatcher>,

    /// Idle time after which a tracker is dropped
    max_idle: Duration,

    /// Sweep interval (half of `max_idle`)
    interval: Duration,
}

impl IdleEvictor {
    pub fn new(dispatcher: Weak<WatchDispatcher>, max_idle: Duration) -> Self {
        Self {
            dispatcher,
            max_idle,
            interval: (max_idle / 2).max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Run the sweep loop until the dispatcher is gone
    pub async fn run(self) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Evicting trackers idle for {:?} (sweep interval: {:?})",
            self.max_idle, self.interval
        );

        loop {
            timer.tick().await;

            let Some(dispatcher) = self.dispatcher.upgrade() else {
                break;
            };

            let evicted = dispatcher.evict_idle(Instant::now(), self.max_idle);
            if evicted > 0 {
                info!(
                    "Evicted {} idle trackers ({} still tracked)",
                    evicted,
                    dispatcher.tracker_count()
                );
            } else {
                debug!("Eviction sweep: nothing idle");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qw_core::{WatchConfig, WatchEvent};
    use std::path::PathBuf;

    fn config() -> WatchConfig {
        WatchConfig {
            root_path: PathBuf::from("/srv/in"),
            file_extensions: vec![".csv".to_string()],
            evict_idle_after_secs: Some(120),
            ..WatchConfig::default()
        }
    }

    #[test]
    fn test_sweep_interval_has_floor() {
        let evictor = IdleEvictor::new(Weak::new(), Duration::from_millis(500));
        assert_eq!(evictor.interval, MIN_SWEEP_INTERVAL);

        let evictor = IdleEvictor::new(Weak::new(), Duration::from_secs(600));
        assert_eq!(evictor.interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_stops_without_dispatcher() {
        let evictor = IdleEvictor::new(Weak::new(), Duration::from_secs(1));
        tokio::time::timeout(Duration::from_secs(2), evictor.run())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_tracker_evicted_pending_kept() {
        let dispatcher = WatchDispatcher::configure(&config()).unwrap();
        let mut rx = dispatcher.subscribe();
        let root = PathBuf::from("/srv/in");

        dispatcher
            .handle_notification("old.csv", &root.join("old.csv"), Instant::now())
            .unwrap();
        loop {
            if let WatchEvent::Ready(_) = rx.recv().await.unwrap() {
                break;
            }
        }

        // Keep a second file busy the whole time
        let busy = root.join("busy.csv");
        for _ in 0..60 {
            dispatcher
                .handle_notification("busy.csv", &busy, Instant::now())
                .unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
        }

        assert!(dispatcher.tracker("old.csv").is_none());
        assert!(dispatcher.tracker("busy.csv").is_some());
    }
}
