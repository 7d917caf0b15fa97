//! Source-to-destination path mapping.

use std::path::{Component, Path, PathBuf};

use super::MirrorError;

/// A (source root, destination root) pair being mirrored.
///
/// Roots are expected to be absolute. [`MirrorBuilder`](super::MirrorBuilder)
/// canonicalizes them before any watcher sees the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    source_root: PathBuf,
    destination_root: PathBuf,
    exclude_hidden: bool,
}

impl Mapping {
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        exclude_hidden: bool,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            exclude_hidden,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Whether entries whose names begin with a dot are skipped.
    pub fn exclude_hidden(&self) -> bool {
        self.exclude_hidden
    }

    /// Path of `path` relative to the source root.
    ///
    /// Returns an empty path for the root itself. Paths outside the root, or
    /// with `..`/`.` segments after the root, are rejected.
    pub fn relative_path<'a>(&self, path: &'a Path) -> Result<&'a Path, MirrorError> {
        let relative = path
            .strip_prefix(&self.source_root)
            .map_err(|_| self.outside(path))?;

        if relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            Ok(relative)
        } else {
            Err(self.outside(path))
        }
    }

    /// Resolve the destination path for a path under the source root.
    pub fn resolve_destination(&self, path: &Path) -> Result<PathBuf, MirrorError> {
        let relative = self.relative_path(path)?;
        if relative.as_os_str().is_empty() {
            Ok(self.destination_root.clone())
        } else {
            Ok(self.destination_root.join(relative))
        }
    }

    /// Check if `path` is the source root itself.
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.source_root
    }

    /// Check if `path` should be left out of mirroring.
    ///
    /// Only components below the root are considered, so a root living under
    /// a dot-directory is still mirrored.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if !self.exclude_hidden {
            return false;
        }
        match path.strip_prefix(&self.source_root) {
            Ok(relative) => relative.components().any(|c| match c {
                Component::Normal(name) => name.to_string_lossy().starts_with('.'),
                _ => false,
            }),
            Err(_) => false,
        }
    }

    fn outside(&self, path: &Path) -> MirrorError {
        MirrorError::OutsideRoot {
            path: path.to_path_buf(),
            root: self.source_root.clone(),
        }
    }
}
