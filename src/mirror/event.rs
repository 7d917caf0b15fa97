//! Normalized mirror events.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};

use super::{Mapping, MirrorError};

/// What happened to an entry under a source root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Added => "added",
            EventKind::Changed => "changed",
            EventKind::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// A normalized filesystem event bound to the mapping it belongs to.
#[derive(Debug, Clone)]
pub struct MirrorEvent {
    pub kind: EventKind,
    /// Absolute path under `mapping.source_root()`.
    pub path: PathBuf,
    pub mapping: Arc<Mapping>,
}

impl MirrorEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>, mapping: Arc<Mapping>) -> Self {
        Self {
            kind,
            path: path.into(),
            mapping,
        }
    }

    /// Destination path this event mutates.
    pub fn destination(&self) -> Result<PathBuf, MirrorError> {
        self.mapping.resolve_destination(&self.path)
    }

    /// Path relative to the source root, for display.
    pub fn relative_path(&self) -> &Path {
        self.mapping
            .relative_path(&self.path)
            .unwrap_or(self.path.as_path())
    }
}

/// Messages flowing from watchers to the dispatcher.
#[derive(Debug)]
pub enum WatchMessage {
    Event(MirrorEvent),
    /// The initial pass over a source root has finished.
    ScanComplete { source_root: PathBuf },
}

/// Translate a raw notify event into (kind, path) pairs.
///
/// Rename halves map to removal of the old name and addition of the new one.
/// Renames reported without a direction are resolved by checking whether the
/// path still exists.
pub fn normalize(kind: &notify::EventKind, paths: &[PathBuf]) -> Vec<(EventKind, PathBuf)> {
    use notify::EventKind as Raw;

    let each = |k: EventKind| paths.iter().map(|p| (k, p.clone())).collect::<Vec<_>>();

    match kind {
        Raw::Create(_) => each(EventKind::Added),
        Raw::Modify(ModifyKind::Name(RenameMode::From)) => each(EventKind::Removed),
        Raw::Modify(ModifyKind::Name(RenameMode::To)) => each(EventKind::Added),
        Raw::Modify(ModifyKind::Name(RenameMode::Both)) => match paths {
            [from, to] => vec![
                (EventKind::Removed, from.clone()),
                (EventKind::Added, to.clone()),
            ],
            _ => Vec::new(),
        },
        Raw::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                let k = if p.exists() {
                    EventKind::Added
                } else {
                    EventKind::Removed
                };
                (k, p.clone())
            })
            .collect(),
        Raw::Modify(_) => each(EventKind::Changed),
        Raw::Remove(_) => each(EventKind::Removed),
        Raw::Access(_) | Raw::Any | Raw::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind as Raw;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_create_modify_remove() {
        assert_eq!(
            normalize(&Raw::Create(CreateKind::File), &[p("/s/a")]),
            vec![(EventKind::Added, p("/s/a"))]
        );
        assert_eq!(
            normalize(
                &Raw::Modify(ModifyKind::Data(DataChange::Content)),
                &[p("/s/a")]
            ),
            vec![(EventKind::Changed, p("/s/a"))]
        );
        assert_eq!(
            normalize(&Raw::Remove(RemoveKind::Any), &[p("/s/a")]),
            vec![(EventKind::Removed, p("/s/a"))]
        );
    }

    #[test]
    fn test_rename_halves() {
        assert_eq!(
            normalize(
                &Raw::Modify(ModifyKind::Name(RenameMode::From)),
                &[p("/s/old")]
            ),
            vec![(EventKind::Removed, p("/s/old"))]
        );
        assert_eq!(
            normalize(&Raw::Modify(ModifyKind::Name(RenameMode::To)), &[p("/s/new")]),
            vec![(EventKind::Added, p("/s/new"))]
        );
        assert_eq!(
            normalize(
                &Raw::Modify(ModifyKind::Name(RenameMode::Both)),
                &[p("/s/old"), p("/s/new")]
            ),
            vec![
                (EventKind::Removed, p("/s/old")),
                (EventKind::Added, p("/s/new"))
            ]
        );
    }

    #[test]
    fn test_undirected_rename_checks_existence() {
        let dir = tempfile::TempDir::new().unwrap();
        let present = dir.path().join("present");
        std::fs::write(&present, b"x").unwrap();
        let gone = dir.path().join("gone");

        let events = normalize(
            &Raw::Modify(ModifyKind::Name(RenameMode::Any)),
            &[present.clone(), gone.clone()],
        );
        assert_eq!(
            events,
            vec![(EventKind::Added, present), (EventKind::Removed, gone)]
        );
    }

    #[test]
    fn test_access_is_ignored() {
        assert!(normalize(&Raw::Access(AccessKind::Any), &[p("/s/a")]).is_empty());
        assert!(normalize(&Raw::Other, &[p("/s/a")]).is_empty());
    }

    #[test]
    fn test_relative_path_display() {
        let mapping = Arc::new(Mapping::new("/s", "/d", false));
        let event = MirrorEvent::new(EventKind::Added, "/s/a/b.txt", mapping);
        assert_eq!(event.relative_path(), Path::new("a/b.txt"));
        assert_eq!(event.destination().unwrap(), p("/d/a/b.txt"));
    }
}
