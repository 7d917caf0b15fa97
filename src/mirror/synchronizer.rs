//! Applies mirror events to the destination tree.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::event::{EventKind, MirrorEvent};
use super::{Mapping, MirrorError};

/// Result of a successfully applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A file was copied or a directory created.
    Copied {
        source: PathBuf,
        destination: PathBuf,
    },
    /// The destination entry is gone (or never existed).
    Removed { destination: PathBuf },
    /// Nothing was done.
    Skipped { path: PathBuf, reason: String },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Copied {
                source,
                destination,
            } => write!(f, "Copied: {} -> {}", source.display(), destination.display()),
            SyncOutcome::Removed { destination } => {
                write!(f, "Removed: {}", destination.display())
            }
            SyncOutcome::Skipped { path, reason } => {
                write!(f, "Skipped: {} ({reason})", path.display())
            }
        }
    }
}

/// Converts events into destination-side mutations.
///
/// Stateless: every call stands alone, so the same synchronizer is shared by
/// all mappings and all in-flight tasks.
#[derive(Debug, Default, Clone, Copy)]
pub struct Synchronizer;

impl Synchronizer {
    pub fn new() -> Self {
        Self
    }

    /// Apply an event and report the outcome. Never fails.
    ///
    /// Success lines go to stdout, failures to stderr. A failure here affects
    /// only this event.
    pub async fn handle(&self, event: &MirrorEvent) -> bool {
        let result = self.apply(event).await;
        report(event, &result);
        result.is_ok()
    }

    /// Apply an event, returning what happened.
    pub async fn apply(&self, event: &MirrorEvent) -> Result<SyncOutcome, MirrorError> {
        match event.kind {
            EventKind::Added | EventKind::Changed => {
                self.copy_entry(&event.mapping, &event.path).await
            }
            EventKind::Removed => self.remove_entry(&event.mapping, &event.path).await,
        }
    }

    /// Copy a file, or create a directory, at its mapped destination.
    ///
    /// A source that vanished before the copy ran is handled as a removal.
    pub async fn copy_entry(
        &self,
        mapping: &Mapping,
        source: &Path,
    ) -> Result<SyncOutcome, MirrorError> {
        let destination = mapping.resolve_destination(source)?;

        let metadata = match fs::metadata(source).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                crate::debug_event!("sync", "source vanished", "{}", source.display());
                return self.remove_entry(mapping, source).await;
            }
            Err(e) => return Err(MirrorError::io(source, e)),
        };

        let existing = fs::symlink_metadata(&destination).await.ok();

        if metadata.is_dir() {
            if let Some(existing) = existing {
                if !existing.is_dir() {
                    fs::remove_file(&destination)
                        .await
                        .map_err(|e| MirrorError::io(&destination, e))?;
                }
            }
            fs::create_dir_all(&destination)
                .await
                .map_err(|e| MirrorError::io(&destination, e))?;
        } else {
            if let Some(existing) = existing {
                if existing.is_dir() {
                    fs::remove_dir_all(&destination)
                        .await
                        .map_err(|e| MirrorError::io(&destination, e))?;
                }
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| MirrorError::io(parent, e))?;
            }
            match fs::copy(source, &destination).await {
                Ok(bytes) => {
                    crate::debug_event!("sync", "copied", "{} ({bytes} bytes)", source.display());
                }
                Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                    return self.remove_entry(mapping, source).await;
                }
                Err(e) => return Err(MirrorError::io(source, e)),
            }
        }

        Ok(SyncOutcome::Copied {
            source: source.to_path_buf(),
            destination,
        })
    }

    /// Delete the mapped destination of `source`. Missing entries are fine.
    ///
    /// The destination root itself is never deleted.
    pub async fn remove_entry(
        &self,
        mapping: &Mapping,
        source: &Path,
    ) -> Result<SyncOutcome, MirrorError> {
        let destination = mapping.resolve_destination(source)?;

        if mapping.is_root(source) {
            tracing::warn!(
                "[sync] source root {} disappeared, keeping {}",
                source.display(),
                destination.display()
            );
            return Ok(SyncOutcome::Skipped {
                path: destination,
                reason: "source root removed".to_string(),
            });
        }

        let result = match fs::symlink_metadata(&destination).await {
            Ok(m) if m.is_dir() => fs::remove_dir_all(&destination).await,
            Ok(_) => fs::remove_file(&destination).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                crate::debug_event!("sync", "already absent", "{}", destination.display());
            }
            Err(e) => return Err(MirrorError::io(&destination, e)),
        }

        Ok(SyncOutcome::Removed { destination })
    }
}

/// Print the human-readable outcome line for an applied event.
pub fn report(event: &MirrorEvent, result: &Result<SyncOutcome, MirrorError>) {
    match result {
        Ok(outcome @ SyncOutcome::Skipped { .. }) => {
            crate::debug_event!("sync", "skipped", "{outcome}");
        }
        Ok(outcome) => println!("{outcome}"),
        Err(e) => match event.kind {
            EventKind::Added | EventKind::Changed => eprintln!("Error copying file: {e}"),
            EventKind::Removed => eprintln!("Error removing file: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        mapping: Arc<Mapping>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let src = dir.path().join("src");
            let dst = dir.path().join("dst");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::create_dir_all(&dst).unwrap();
            Self {
                mapping: Arc::new(Mapping::new(src, dst, false)),
                _dir: dir,
            }
        }

        fn src(&self, rel: &str) -> PathBuf {
            self.mapping.source_root().join(rel)
        }

        fn dst(&self, rel: &str) -> PathBuf {
            self.mapping.destination_root().join(rel)
        }

        fn event(&self, kind: EventKind, rel: &str) -> MirrorEvent {
            MirrorEvent::new(kind, self.src(rel), self.mapping.clone())
        }
    }

    #[tokio::test]
    async fn test_copy_creates_parent_directories() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.src("a/b")).unwrap();
        std::fs::write(fx.src("a/b/c.txt"), "hi").unwrap();

        let outcome = Synchronizer::new()
            .apply(&fx.event(EventKind::Added, "a/b/c.txt"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Copied {
                source: fx.src("a/b/c.txt"),
                destination: fx.dst("a/b/c.txt"),
            }
        );
        assert_eq!(std::fs::read_to_string(fx.dst("a/b/c.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_change_overwrites_destination() {
        let fx = Fixture::new();
        std::fs::write(fx.src("f.txt"), "a much longer first version").unwrap();
        std::fs::write(fx.dst("f.txt"), "stale content that is longer still").unwrap();

        std::fs::write(fx.src("f.txt"), "bye").unwrap();
        assert!(
            Synchronizer::new()
                .handle(&fx.event(EventKind::Changed, "f.txt"))
                .await
        );
        assert_eq!(std::fs::read(fx.dst("f.txt")).unwrap(), b"bye");
    }

    #[tokio::test]
    async fn test_directory_entry_creates_empty_directory() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.src("empty/nested")).unwrap();

        Synchronizer::new()
            .apply(&fx.event(EventKind::Added, "empty/nested"))
            .await
            .unwrap();

        assert!(fx.dst("empty/nested").is_dir());
        assert_eq!(std::fs::read_dir(fx.dst("empty/nested")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_type_change_replaces_destination() {
        let fx = Fixture::new();
        // Destination has a directory where the source now has a file
        std::fs::create_dir_all(fx.dst("thing/inner")).unwrap();
        std::fs::write(fx.src("thing"), "file now").unwrap();

        Synchronizer::new()
            .apply(&fx.event(EventKind::Changed, "thing"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(fx.dst("thing")).unwrap(), "file now");

        // And back again
        std::fs::remove_file(fx.src("thing")).unwrap();
        std::fs::create_dir(fx.src("thing")).unwrap();
        Synchronizer::new()
            .apply(&fx.event(EventKind::Changed, "thing"))
            .await
            .unwrap();
        assert!(fx.dst("thing").is_dir());
    }

    #[tokio::test]
    async fn test_remove_file_and_tree() {
        let fx = Fixture::new();
        std::fs::write(fx.dst("f.txt"), "x").unwrap();
        std::fs::create_dir_all(fx.dst("d/e")).unwrap();
        std::fs::write(fx.dst("d/e/g.txt"), "y").unwrap();

        let sync = Synchronizer::new();
        let outcome = sync
            .apply(&fx.event(EventKind::Removed, "f.txt"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Removed {
                destination: fx.dst("f.txt")
            }
        );
        assert!(!fx.dst("f.txt").exists());

        sync.apply(&fx.event(EventKind::Removed, "d")).await.unwrap();
        assert!(!fx.dst("d").exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let fx = Fixture::new();
        let sync = Synchronizer::new();

        let event = fx.event(EventKind::Removed, "never/existed.txt");
        assert!(sync.apply(&event).await.is_ok());
        assert!(sync.apply(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_vanished_source_is_removed() {
        let fx = Fixture::new();
        std::fs::write(fx.dst("gone.txt"), "old").unwrap();

        let outcome = Synchronizer::new()
            .apply(&fx.event(EventKind::Changed, "gone.txt"))
            .await
            .unwrap();

        assert!(matches!(outcome, SyncOutcome::Removed { .. }));
        assert!(!fx.dst("gone.txt").exists());
    }

    #[tokio::test]
    async fn test_root_removal_keeps_destination() {
        let fx = Fixture::new();
        std::fs::write(fx.dst("keep.txt"), "x").unwrap();

        let event = MirrorEvent::new(
            EventKind::Removed,
            fx.mapping.source_root(),
            fx.mapping.clone(),
        );
        let outcome = Synchronizer::new().apply(&event).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
        assert!(fx.dst("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_path_outside_root_fails_without_panicking() {
        let fx = Fixture::new();
        let event = MirrorEvent::new(EventKind::Added, "/definitely/elsewhere", fx.mapping.clone());

        let sync = Synchronizer::new();
        assert!(matches!(
            sync.apply(&event).await,
            Err(MirrorError::OutsideRoot { .. })
        ));
        assert!(!sync.handle(&event).await);
    }

    #[test]
    fn test_outcome_lines() {
        let copied = SyncOutcome::Copied {
            source: PathBuf::from("/s/a.txt"),
            destination: PathBuf::from("/d/a.txt"),
        };
        assert_eq!(copied.to_string(), "Copied: /s/a.txt -> /d/a.txt");

        let removed = SyncOutcome::Removed {
            destination: PathBuf::from("/d/a.txt"),
        };
        assert_eq!(removed.to_string(), "Removed: /d/a.txt");
    }
}
