//! Core types for the workspace consistency layer
//!
//! This crate provides the abstractions shared by the change watcher and the
//! snapshot aggregator:
//!
//! - **Changes**: the on-disk change model and the [`Notifier`] boundary
//! - **Diagnostics**: counters for errors that are logged and swallowed
//! - **Configuration**: watcher and aggregator settings
//! - **Error handling**: unified error types
//!

pub mod changes;
pub mod config;
pub mod diagnostics;
pub mod error;

// Re-export main types for convenience
pub use changes::{ChangeBatch, ChangeEvent, ChangeKind, ChangeOrigin, Notifier};
pub use config::{AggregatorConfig, Config, WatcherConfig};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use error::{Error, Result, ResultExt};
