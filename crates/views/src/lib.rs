#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Workspace-wide read queries over the engine's active views
//!
//! [`SnapshotAggregator`] runs a query against one snapshot per active
//! [`View`], skips views that cannot currently produce a snapshot, and
//! guarantees every acquired snapshot is released exactly once.

mod aggregator;
mod session;

pub use aggregator::SnapshotAggregator;
pub use session::{SnapshotGuard, View, ViewSet};
