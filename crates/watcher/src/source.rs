//! Recursive directory notification source
//!
//! Bridges `notify` callbacks onto a dedicated ingest thread that feeds the
//! dispatcher. Created and modified events are forwarded; removals, renames
//! and access events are not.

use crate::dispatcher::WatchDispatcher;
use crate::{ChangeKind, RawNotification};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use qw_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Running directory watch; dropping it stops the notifications
pub struct NotificationSource {
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl NotificationSource {
    /// Watch `root` recursively and feed every notification to `dispatcher`
    pub fn spawn(root: &Path, dispatcher: Arc<WatchDispatcher>) -> Result<Self> {
        // Event paths come back canonical on some platforms
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let (tx, rx) = crossbeam_channel::unbounded::<notify::Result<Event>>();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| Error::Source(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::Source(format!("{}: {}", root.display(), e)))?;

        let ingest_root = root.clone();
        thread::Builder::new()
            .name("qw-ingest".to_string())
            .spawn(move || {
                // Ends when the watcher (and with it the sender) is dropped
                while let Ok(res) = rx.recv() {
                    match res {
                        Ok(event) => {
                            for notification in to_notifications(&ingest_root, &event) {
                                dispatcher.dispatch(notification);
                            }
                        }
                        Err(e) => warn!("notify error: {}", e),
                    }
                }
                debug!("ingest thread for {} stopped", ingest_root.display());
            })
            .map_err(|e| Error::Source(e.to_string()))?;

        Ok(Self { watcher, root })
    }

    /// Stop watching; notifications already queued are still routed
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!("unwatch {}: {}", self.root.display(), e);
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map a notify event onto raw notifications, one per path
fn to_notifications(root: &Path, event: &Event) -> Vec<RawNotification> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };

    let changed_at = Instant::now();
    event
        .paths
        .iter()
        .filter_map(|path| {
            let name = relative_name(root, path)?;
            Some(RawNotification {
                name,
                full_path: path.clone(),
                kind,
                changed_at,
            })
        })
        .collect()
}

/// Registry key for a path: relative to the root, or the bare file name
fn relative_name(root: &Path, path: &Path) -> Option<String> {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => Some(rel.to_string_lossy().into_owned()),
        _ => path.file_name().map(|n| n.to_string_lossy().into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_create_and_modify_forwarded() {
        let root = Path::new("/srv/in");

        let created = to_notifications(
            root,
            &event(EventKind::Create(CreateKind::File), &["/srv/in/a.csv"]),
        );
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "a.csv");
        assert_eq!(created[0].kind, ChangeKind::Created);

        let modified = to_notifications(
            root,
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/srv/in/sub/b.csv"],
            ),
        );
        assert_eq!(modified[0].name, "sub/b.csv");
        assert_eq!(modified[0].kind, ChangeKind::Modified);
        assert_eq!(modified[0].full_path, PathBuf::from("/srv/in/sub/b.csv"));
    }

    #[test]
    fn test_removal_and_rename_ignored() {
        let root = Path::new("/srv/in");

        let removed = event(EventKind::Remove(RemoveKind::File), &["/srv/in/a.csv"]);
        assert!(to_notifications(root, &removed).is_empty());

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/srv/in/a.tmp", "/srv/in/a.csv"],
        );
        assert!(to_notifications(root, &renamed).is_empty());
    }

    #[test]
    fn test_path_outside_root_uses_file_name() {
        assert_eq!(
            relative_name(Path::new("/var/in"), Path::new("/private/var/in/x/a.csv")),
            Some("a.csv".to_string())
        );
    }
}
