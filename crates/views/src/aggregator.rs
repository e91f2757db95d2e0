//! Workspace-wide queries across every active view
//!
//! Each call enumerates the active views, acquires one snapshot per view,
//! runs the caller's query against the snapshots that could be acquired,
//! and releases every acquired snapshot before returning. Release is tied
//! to [`SnapshotGuard`]'s `Drop`, so it also happens when the query panics
//! or the returned future is dropped mid-acquisition.

use crate::session::{SnapshotGuard, View, ViewSet};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use wsync_core::error::{Error, Result};
use wsync_core::{AggregatorConfig, Diagnostics};

type SnapshotOf<V> = <<V as ViewSet>::View as View>::Snapshot;

/// Runs read queries across all active views of a session
pub struct SnapshotAggregator<V: ViewSet> {
    views: Arc<V>,
    config: AggregatorConfig,
    diagnostics: Arc<Diagnostics>,
}

impl<V: ViewSet> SnapshotAggregator<V> {
    pub fn new(views: Arc<V>) -> Self {
        Self::with_config(views, AggregatorConfig::default())
    }

    pub fn with_config(views: Arc<V>, config: AggregatorConfig) -> Self {
        Self {
            views,
            config,
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    /// Record into a shared diagnostic sink instead of a private one
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Run `query` once against the snapshots of every usable view
    ///
    /// Fails with [`Error::NoActiveViews`] when the session has no views and
    /// with [`Error::NoUsableSnapshots`] when none of them produced a
    /// snapshot. Views that fail to produce one are logged and skipped.
    pub async fn run_across_views<R, F>(&self, query: F) -> Result<R>
    where
        F: FnOnce(&[SnapshotGuard<SnapshotOf<V>>]) -> Result<R>,
    {
        let snapshots = self.acquire_all().await?;
        debug!("Running query across {} snapshots", snapshots.len());
        query(&snapshots)
        // `snapshots` drops here, releasing every handle.
    }

    /// Run `query` separately against each usable view's snapshot
    ///
    /// Per-view query failures are logged and skipped. If the query fails
    /// for every snapshot, the first failure is returned.
    pub async fn run_per_view<T, F>(&self, query: F) -> Result<Vec<T>>
    where
        F: Fn(&SnapshotGuard<SnapshotOf<V>>) -> Result<T>,
    {
        let snapshots = self.acquire_all().await?;

        let mut results = Vec::with_capacity(snapshots.len());
        let mut first_error = None;
        for snapshot in &snapshots {
            match query(snapshot) {
                Ok(value) => results.push(value),
                Err(e) => {
                    warn!("Query failed for view {}: {}", snapshot.view_id(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if results.is_empty() => Err(e),
            _ => Ok(results),
        }
    }

    async fn acquire_all(&self) -> Result<Vec<SnapshotGuard<SnapshotOf<V>>>> {
        let views = self.views.active_views();
        if views.is_empty() {
            return Err(Error::NoActiveViews);
        }

        let outcomes = if self.config.concurrent_acquisition {
            join_all(views.iter().map(|view| view.acquire_snapshot())).await
        } else {
            let mut outcomes = Vec::with_capacity(views.len());
            for view in &views {
                outcomes.push(view.acquire_snapshot().await);
            }
            outcomes
        };

        let attempted = views.len();
        let mut snapshots = Vec::with_capacity(attempted);
        for (view, outcome) in views.iter().zip(outcomes) {
            match outcome {
                Ok(mut guard) => {
                    guard.track(Arc::clone(&self.diagnostics));
                    snapshots.push(guard);
                }
                Err(e) => {
                    warn!("Skipping view {}: {}", view.id(), e);
                    self.diagnostics.record_view_skipped();
                }
            }
        }

        if snapshots.is_empty() {
            return Err(Error::NoUsableSnapshots { attempted });
        }
        debug!("Acquired {}/{} snapshots", snapshots.len(), attempted);
        Ok(snapshots)
    }
}

impl<V: ViewSet> std::fmt::Debug for SnapshotAggregator<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotAggregator")
            .field("config", &self.config)
            .finish()
    }
}
