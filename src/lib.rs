pub mod cli;
pub mod config;
pub mod logging;
pub mod mirror;

pub use config::{LoggingConfig, MappingConfig, Settings};
pub use mirror::{
    EventKind, EventWatcher, Mapping, Mirror, MirrorBuilder, MirrorError, MirrorEvent,
    SyncOutcome, SyncReport, Synchronizer,
};
