//! The running mirror: mappings, watchers and the dispatch loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MappingConfig;

use super::dispatch::Dispatcher;
use super::event::{EventKind, MirrorEvent};
use super::synchronizer::{Synchronizer, report};
use super::watcher::{EventWatcher, walk};
use super::{Mapping, MirrorError};

/// Capacity of the channel between watchers and the dispatcher.
const CHANNEL_CAPACITY: usize = 256;

/// Counts from a one-shot synchronization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Mirrors one or more source directories into their destinations.
///
/// Owns every watcher it starts; nothing is registered globally.
pub struct Mirror {
    mappings: Vec<Arc<Mapping>>,
    synchronizer: Arc<Synchronizer>,
    debounce_ms: u64,
    watchers: Vec<EventWatcher>,
    dispatcher: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Mirror {
    /// Create a builder for configuring the mirror.
    pub fn builder() -> MirrorBuilder {
        MirrorBuilder::new()
    }

    pub fn mappings(&self) -> &[Arc<Mapping>] {
        &self.mappings
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Start one watcher per mapping and the dispatch loop.
    ///
    /// Each watcher first reports every existing entry, so the destinations
    /// converge to a full copy before live changes are mirrored.
    pub fn start(&mut self) -> Result<(), MirrorError> {
        if self.is_running() {
            return Err(MirrorError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut watchers = Vec::with_capacity(self.mappings.len());
        for mapping in &self.mappings {
            // Watchers already started are dropped (and released) on error
            watchers.push(EventWatcher::start(mapping.clone(), tx.clone())?);
            crate::log_event!(
                "mirror",
                "mapping",
                "{} -> {}",
                mapping.source_root().display(),
                mapping.destination_root().display()
            );
        }
        drop(tx);

        self.cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            rx,
            self.synchronizer.clone(),
            self.debounce_ms,
            watchers.len(),
        );
        self.dispatcher = Some(tokio::spawn(dispatcher.run(self.cancel.clone())));
        self.watchers = watchers;

        crate::log_event!("mirror", "started", "{} mappings", self.mappings.len());
        Ok(())
    }

    /// Stop every watcher and the dispatch loop.
    ///
    /// Returns once every event received so far, including copies still
    /// inside their debounce window, has been applied.
    pub async fn stop(&mut self) {
        let active = self.watchers.iter().filter(|w| w.is_active()).count();
        crate::debug_event!("mirror", "stopping", "{active} active watchers");
        for mut watcher in self.watchers.drain(..) {
            watcher.stop();
        }
        self.cancel.cancel();
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                tracing::error!("[mirror] dispatch loop failed: {e}");
            }
            crate::log_event!("mirror", "stopped");
        }
    }

    /// Start, wait for Ctrl-C, then stop.
    pub async fn run_until_shutdown(mut self) -> Result<(), MirrorError> {
        self.start()?;
        let signal = tokio::signal::ctrl_c().await;
        self.stop().await;
        signal.map_err(|e| MirrorError::io("ctrl-c handler", e))
    }

    /// Copy every existing entry once, without watching.
    ///
    /// Entries are applied sequentially, parents before children.
    pub async fn sync_once(&self) -> SyncReport {
        let mut summary = SyncReport::default();

        for mapping in &self.mappings {
            let walk_mapping = mapping.clone();
            let entries = tokio::task::spawn_blocking(move || {
                walk(&walk_mapping, walk_mapping.source_root()).collect::<Vec<PathBuf>>()
            })
            .await
            .unwrap_or_else(|e| {
                tracing::error!("[mirror] walk of {} failed: {e}", mapping.source_root().display());
                Vec::new()
            });

            for entry in entries {
                let event = MirrorEvent::new(EventKind::Added, entry, mapping.clone());
                let result = self.synchronizer.apply(&event).await;
                report(&event, &result);
                match result {
                    Ok(_) => summary.succeeded += 1,
                    Err(_) => summary.failed += 1,
                }
            }
        }

        crate::log_event!(
            "mirror",
            "synchronized",
            "{} entries, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }
}

impl Drop for Mirror {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builder for constructing a [`Mirror`].
pub struct MirrorBuilder {
    mappings: Vec<MappingConfig>,
    debounce_ms: u64,
}

impl MirrorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            mappings: Vec::new(),
            debounce_ms: crate::config::DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Add a mapping.
    pub fn mapping(mut self, mapping: MappingConfig) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Add several mappings.
    pub fn mappings(mut self, mappings: impl IntoIterator<Item = MappingConfig>) -> Self {
        self.mappings.extend(mappings);
        self
    }

    /// Set the debounce duration in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Validate the mappings and prepare destinations.
    ///
    /// All sources are checked before any destination is touched.
    pub fn build(self) -> Result<Mirror, MirrorError> {
        if self.mappings.is_empty() {
            return Err(MirrorError::NoMappings);
        }

        let mut sources = Vec::with_capacity(self.mappings.len());
        for config in &self.mappings {
            let source = validate_source(&config.source)?;
            let destination = absolute(&config.destination)?;
            if destination.starts_with(&source) {
                return Err(MirrorError::DestinationInsideSource {
                    source_root: source,
                    destination,
                });
            }
            sources.push(source);
        }

        let mut mappings = Vec::with_capacity(sources.len());
        for (config, source) in self.mappings.iter().zip(sources) {
            let destination = prepare_destination(&config.destination)?;
            mappings.push(Arc::new(Mapping::new(
                source,
                destination,
                config.exclude_hidden,
            )));
        }

        Ok(Mirror {
            mappings,
            synchronizer: Arc::new(Synchronizer::new()),
            debounce_ms: self.debounce_ms,
            watchers: Vec::new(),
            dispatcher: None,
            cancel: CancellationToken::new(),
        })
    }
}

impl Default for MirrorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_source(path: &Path) -> Result<PathBuf, MirrorError> {
    let metadata = std::fs::metadata(path).map_err(|_| MirrorError::SourceMissing {
        path: path.to_path_buf(),
    })?;
    if !metadata.is_dir() {
        return Err(MirrorError::SourceNotDirectory {
            path: path.to_path_buf(),
        });
    }
    path.canonicalize().map_err(|e| MirrorError::io(path, e))
}

/// Absolute form of a destination that may not exist yet.
///
/// Canonicalizes the nearest existing ancestor so the result compares
/// correctly against canonical source roots.
fn absolute(path: &Path) -> Result<PathBuf, MirrorError> {
    let path = std::path::absolute(path).map_err(|e| MirrorError::io(path, e))?;
    let mut existing = path.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            resolved.extend(rest.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(path.clone()),
        }
    }
}

fn prepare_destination(path: &Path) -> Result<PathBuf, MirrorError> {
    std::fs::create_dir_all(path).map_err(|e| MirrorError::DestinationUnavailable {
        path: path.to_path_buf(),
        source: e,
    })?;
    path.canonicalize()
        .map_err(|e| MirrorError::DestinationUnavailable {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(source: &Path, destination: &Path) -> MappingConfig {
        MappingConfig {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            exclude_hidden: false,
        }
    }

    #[test]
    fn test_build_requires_mappings() {
        assert!(matches!(
            Mirror::builder().build(),
            Err(MirrorError::NoMappings)
        ));
    }

    #[test]
    fn test_missing_source_touches_no_destination() {
        let dir = TempDir::new().unwrap();
        let good_src = dir.path().join("good");
        std::fs::create_dir(&good_src).unwrap();

        let result = Mirror::builder()
            .mapping(config(&good_src, &dir.path().join("out1")))
            .mapping(config(&dir.path().join("missing"), &dir.path().join("out2")))
            .build();

        assert!(matches!(result, Err(MirrorError::SourceMissing { .. })));
        assert!(!dir.path().join("out1").exists());
        assert!(!dir.path().join("out2").exists());
    }

    #[test]
    fn test_source_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let result = Mirror::builder()
            .mapping(config(&file, &dir.path().join("out")))
            .build();
        assert!(matches!(result, Err(MirrorError::SourceNotDirectory { .. })));
    }

    #[test]
    fn test_destination_inside_source_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let result = Mirror::builder()
            .mapping(config(&src, &src.join("backup")))
            .build();
        assert!(matches!(
            result,
            Err(MirrorError::DestinationInsideSource { .. })
        ));
        assert!(!src.join("backup").exists());
    }

    #[test]
    fn test_build_creates_destination_and_canonicalizes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        let dst = dir.path().join("deep/nested/dst");

        let mirror = Mirror::builder()
            .mapping(config(&src, &dst))
            .debounce_ms(10)
            .build()
            .unwrap();

        assert!(dst.is_dir());
        let mapping = &mirror.mappings()[0];
        assert_eq!(mapping.source_root(), src.canonicalize().unwrap());
        assert_eq!(mapping.destination_root(), dst.canonicalize().unwrap());
        assert!(!mirror.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let mut mirror = Mirror::builder()
            .mapping(config(&src, &dir.path().join("dst")))
            .build()
            .unwrap();

        mirror.start().unwrap();
        assert!(mirror.is_running());
        assert!(matches!(mirror.start(), Err(MirrorError::AlreadyRunning)));

        mirror.stop().await;
        assert!(!mirror.is_running());
    }

    #[tokio::test]
    async fn test_sync_once_counts_entries() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("a/b")).unwrap();
        std::fs::write(src.join("a/b/c.txt"), "c").unwrap();
        std::fs::write(src.join("root.txt"), "r").unwrap();

        let dst = dir.path().join("dst");
        let mirror = Mirror::builder()
            .mapping(config(&src, &dst))
            .build()
            .unwrap();

        let report = mirror.sync_once().await;
        assert_eq!(
            report,
            SyncReport {
                succeeded: 4,
                failed: 0
            }
        );
        assert_eq!(std::fs::read_to_string(dst.join("a/b/c.txt")).unwrap(), "c");
        assert_eq!(std::fs::read_to_string(dst.join("root.txt")).unwrap(), "r");
    }
}
