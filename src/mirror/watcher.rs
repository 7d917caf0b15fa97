//! Recursive source-tree watcher producing normalized events.

use std::path::Path;
use std::sync::Arc;

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::event::{EventKind, MirrorEvent, WatchMessage, normalize};
use super::{Mapping, MirrorError};

/// Watches one mapping's source tree.
///
/// Raw notify events are normalized on notify's callback thread and pushed
/// into the shared channel. Dropping the watcher releases the OS watch.
pub struct EventWatcher {
    mapping: Arc<Mapping>,
    /// The underlying file watcher. `None` once stopped.
    watcher: Option<notify::RecommendedWatcher>,
    /// Initial synchronization pass.
    scan: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl EventWatcher {
    /// Start watching `mapping.source_root()` and run the initial pass.
    ///
    /// Must be called from within a tokio runtime. Fails before any watch is
    /// established when the source root does not exist.
    pub fn start(
        mapping: Arc<Mapping>,
        tx: mpsc::Sender<WatchMessage>,
    ) -> Result<Self, MirrorError> {
        let root = mapping.source_root().to_path_buf();
        if !root.exists() {
            return Err(MirrorError::SourceMissing { path: root });
        }

        let cancel = CancellationToken::new();

        let callback_mapping = mapping.clone();
        let callback_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => forward(&callback_mapping, &callback_tx, event),
                Err(e) => tracing::warn!("[watcher] file watch error: {e}"),
            }
        })?;

        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => crate::debug_event!("watcher", "watching", "{}", root.display()),
            Err(e) => {
                // Keep going: the initial pass still mirrors what is readable
                let err = MirrorError::PathWatchFailed {
                    path: root.clone(),
                    reason: e.to_string(),
                };
                tracing::error!("[watcher] {err}");
            }
        }

        let scan_mapping = mapping.clone();
        let scan_cancel = cancel.clone();
        let scan = tokio::task::spawn_blocking(move || {
            let sent = scan_tree(&scan_mapping, scan_mapping.source_root(), &tx, &scan_cancel);
            crate::debug_event!(
                "watcher",
                "initial pass",
                "{sent} entries under {}",
                scan_mapping.source_root().display()
            );
            let _ = tx.blocking_send(WatchMessage::ScanComplete {
                source_root: scan_mapping.source_root().to_path_buf(),
            });
        });

        Ok(Self {
            mapping,
            watcher: Some(watcher),
            scan: Some(scan),
            cancel,
        })
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop watching and release the OS watch handle.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(self.mapping.source_root()) {
                crate::debug_event!("watcher", "unwatch failed", "{e}");
            }
            crate::debug_event!(
                "watcher",
                "stopped",
                "{}",
                self.mapping.source_root().display()
            );
        }
        if let Some(scan) = self.scan.take() {
            scan.abort();
        }
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Normalize a raw event and push the results into the channel.
///
/// Runs on notify's thread, so the blocking send is fine here.
fn forward(mapping: &Arc<Mapping>, tx: &mpsc::Sender<WatchMessage>, event: Event) {
    for (kind, path) in normalize(&event.kind, &event.paths) {
        if mapping.is_excluded(&path) || mapping.relative_path(&path).is_err() {
            continue;
        }

        let is_new_dir = kind == EventKind::Added && path.is_dir();
        let message = WatchMessage::Event(MirrorEvent::new(kind, path.clone(), mapping.clone()));
        if tx.blocking_send(message).is_err() {
            return;
        }

        // A directory moved into the tree arrives as a single event
        if is_new_dir {
            scan_tree(mapping, &path, tx, &CancellationToken::new());
        }
    }
}

/// Report every entry below `dir` as added, parents before children.
///
/// Unreadable subtrees are logged and skipped. Returns the number of events
/// sent.
pub(crate) fn scan_tree(
    mapping: &Arc<Mapping>,
    dir: &Path,
    tx: &mpsc::Sender<WatchMessage>,
    cancel: &CancellationToken,
) -> usize {
    let mut sent = 0;
    for entry in walk(mapping, dir) {
        if cancel.is_cancelled() {
            break;
        }
        let event = MirrorEvent::new(EventKind::Added, entry, mapping.clone());
        if tx.blocking_send(WatchMessage::Event(event)).is_err() {
            break;
        }
        sent += 1;
    }
    sent
}

/// Entries below `dir` that the mapping mirrors, parents first.
pub(crate) fn walk<'a>(
    mapping: &'a Mapping,
    dir: &Path,
) -> impl Iterator<Item = std::path::PathBuf> + 'a {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |entry| !mapping.is_excluded(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                tracing::warn!("[watcher] skipping unreadable entry: {e}");
                None
            }
        })
}
