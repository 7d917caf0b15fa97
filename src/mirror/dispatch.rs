//! Event loop between the watchers and the synchronizer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::debouncer::Debouncer;
use super::event::{EventKind, MirrorEvent, WatchMessage};
use super::synchronizer::{Synchronizer, report};

/// How often debounced events are checked.
const TICK: Duration = Duration::from_millis(50);

/// Routes watcher messages to the synchronizer.
///
/// Every event runs as its own task. Tasks targeting the same destination path
/// are chained so that a later event never overtakes an earlier one.
pub(crate) struct Dispatcher {
    rx: mpsc::Receiver<WatchMessage>,
    synchronizer: Arc<Synchronizer>,
    debouncer: Debouncer,
    /// Last task spawned per destination path.
    in_flight: HashMap<PathBuf, JoinHandle<()>>,
    /// Mappings whose initial pass has not finished yet.
    pending_scans: usize,
}

impl Dispatcher {
    pub(crate) fn new(
        rx: mpsc::Receiver<WatchMessage>,
        synchronizer: Arc<Synchronizer>,
        debounce_ms: u64,
        pending_scans: usize,
    ) -> Self {
        Self {
            rx,
            synchronizer,
            debouncer: Debouncer::new(debounce_ms),
            in_flight: HashMap::new(),
            pending_scans,
        }
    }

    /// Run until cancelled or until every watcher is gone.
    ///
    /// On exit, messages still queued and copies still waiting out their
    /// debounce window are dispatched, and every dispatched task is awaited
    /// before returning.
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        // One timer for the whole loop so incoming traffic cannot starve it
        let mut tick = interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                message = self.rx.recv() => match message {
                    Some(message) => self.receive(message),
                    None => break,
                },

                _ = tick.tick() => {
                    for (key, event) in self.debouncer.take_ready() {
                        self.dispatch(key, event);
                    }
                    self.in_flight.retain(|_, handle| !handle.is_finished());
                }
            }
        }

        self.rx.close();
        while let Ok(message) = self.rx.try_recv() {
            self.receive(message);
        }
        for (key, event) in self.debouncer.drain() {
            self.dispatch(key, event);
        }

        let remaining = self.in_flight.len();
        for (_, handle) in self.in_flight.drain() {
            if let Err(e) = handle.await {
                tracing::error!("[dispatch] sync task failed: {e}");
            }
        }
        crate::debug_event!("dispatch", "stopped", "{remaining} tasks settled");
    }

    fn receive(&mut self, message: WatchMessage) {
        match message {
            WatchMessage::Event(event) => self.accept(event),
            WatchMessage::ScanComplete { source_root } => self.scan_complete(source_root),
        }
    }

    fn accept(&mut self, event: MirrorEvent) {
        let key = match event.destination() {
            Ok(key) => key,
            Err(e) => {
                report(&event, &Err(e));
                return;
            }
        };

        match event.kind {
            EventKind::Added | EventKind::Changed => self.debouncer.record(key, event),
            EventKind::Removed => {
                self.debouncer.remove(&key);
                self.dispatch(key, event);
            }
        }
    }

    fn dispatch(&mut self, key: PathBuf, event: MirrorEvent) {
        crate::debug_event!(
            "dispatch",
            event.kind,
            "{}",
            event.relative_path().display()
        );

        let previous = self.in_flight.remove(&key);
        let synchronizer = self.synchronizer.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            synchronizer.handle(&event).await;
        });
        self.in_flight.insert(key, handle);
    }

    fn scan_complete(&mut self, source_root: PathBuf) {
        crate::debug_event!("dispatch", "initial pass queued", "{}", source_root.display());
        self.pending_scans = self.pending_scans.saturating_sub(1);
        if self.pending_scans == 0 {
            crate::log_event!("mirror", "ready");
            println!("Watching for changes...");
        }
    }
}
