//! Directory mirroring: watch source trees and replicate every change.
//!
//! # Architecture
//!
//! ```text
//! Mirror
//!   - one EventWatcher per Mapping (notify::RecommendedWatcher)
//!   - shared mpsc channel of normalized events
//!   - Dispatcher: debounce, per-destination ordering
//!         |
//!    Synchronizer (copy / create / remove)
//! ```

mod debouncer;
mod dispatch;
mod engine;
mod error;
mod event;
mod mapping;
mod synchronizer;
mod watcher;

pub use debouncer::Debouncer;
pub use engine::{Mirror, MirrorBuilder, SyncReport};
pub use error::MirrorError;
pub use event::{EventKind, MirrorEvent, WatchMessage, normalize};
pub use mapping::Mapping;
pub use synchronizer::{SyncOutcome, Synchronizer};
pub use watcher::EventWatcher;
