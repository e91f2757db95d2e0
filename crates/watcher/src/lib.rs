#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! File system watching for workspace cache invalidation
//!
//! This crate turns bursty, possibly duplicated filesystem notifications
//! into coalesced [`ChangeBatch`](wsync_core::ChangeBatch)es delivered to a
//! single [`Notifier`](wsync_core::Notifier):
//! - Per-directory registration that follows newly created directories
//! - Quiet-period debouncing of the whole batch
//! - Created / Changed / Deleted classification, renames included
//! - Best-effort delivery with swallowed, counted observation errors
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsync_core::{ChangeBatch, Notifier, Result};
//! use wsync_watcher::ChangeWatcher;
//!
//! struct Engine;
//!
//! #[async_trait::async_trait]
//! impl Notifier for Engine {
//!     async fn notify_changed(&self, batch: ChangeBatch) -> Result<()> {
//!         println!("{} paths changed", batch.len());
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let watcher = ChangeWatcher::new(Arc::new(Engine), "/path/to/project")?;
//! // ... later
//! watcher.close().await;
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod classify;
mod debouncer;
mod ignore;
mod registry;
mod watcher;

// Public exports - minimal API surface
pub use watcher::ChangeWatcher;
pub use wsync_core::WatcherConfig;
