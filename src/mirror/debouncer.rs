//! Debouncing of copy events.
//!
//! Editors and build tools often write a file several times in quick
//! succession. Copying on every write wastes I/O, so Added/Changed events are
//! held until their destination path has been quiet for the configured
//! duration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::event::{EventKind, MirrorEvent};

#[derive(Debug)]
struct Pending {
    event: MirrorEvent,
    last_change: Instant,
}

/// Debounces mirror events by destination path.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, Pending>,
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given duration in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record an event, resetting the timer for its key.
    ///
    /// A pending `Added` stays `Added` when a `Changed` follows it.
    pub fn record(&mut self, key: PathBuf, event: MirrorEvent) {
        let now = Instant::now();
        match self.pending.get_mut(&key) {
            Some(pending) => {
                if pending.event.kind != EventKind::Added {
                    pending.event.kind = event.kind;
                }
                pending.event.path = event.path;
                pending.event.mapping = event.mapping;
                pending.last_change = now;
            }
            None => {
                self.pending.insert(
                    key,
                    Pending {
                        event,
                        last_change: now,
                    },
                );
            }
        }
    }

    /// Drop a pending event (e.g. when the entry was removed).
    pub fn remove(&mut self, key: &Path) -> Option<MirrorEvent> {
        self.pending.remove(key).map(|p| p.event)
    }

    /// Take all events whose key has been stable for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<(PathBuf, MirrorEvent)> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|key, pending| {
            if now.duration_since(pending.last_change) >= self.duration {
                ready.push((key.clone(), pending.event.clone()));
                false
            } else {
                true
            }
        });

        ready
    }

    /// Take everything still pending, regardless of age.
    pub fn drain(&mut self) -> Vec<(PathBuf, MirrorEvent)> {
        self.pending.drain().map(|(k, p)| (k, p.event)).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
