//! Boundary traits for the engine's per-root views
//!
//! A [`View`] is a long-lived analysis cache for one workspace root. A
//! snapshot is a point-in-time, reference-counted read handle on a view;
//! every successful acquisition must be released exactly once. The
//! [`SnapshotGuard`] returned by [`View::acquire_snapshot`] owns that
//! obligation and discharges it on drop.

use async_trait::async_trait;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use wsync_core::error::Result;
use wsync_core::Diagnostics;

/// One root's analysis cache
#[async_trait]
pub trait View: Send + Sync {
    /// Read handle produced by this view
    type Snapshot: Send + Sync;

    /// Stable name used in logs and errors
    fn id(&self) -> &str;

    /// Acquire a consistent read handle on the view's current state
    async fn acquire_snapshot(&self) -> Result<SnapshotGuard<Self::Snapshot>>;
}

/// Enumeration of the session's active views
pub trait ViewSet: Send + Sync {
    type View: View;

    /// Currently active views, in no particular order. May be empty.
    fn active_views(&self) -> Vec<Arc<Self::View>>;
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// Acquired snapshot plus its release action
///
/// The release action runs exactly once: when the guard is dropped, or
/// earlier through [`SnapshotGuard::release`].
pub struct SnapshotGuard<S> {
    view_id: String,
    snapshot: S,
    release: Option<ReleaseFn>,
    diagnostics: Option<Arc<Diagnostics>>,
}

impl<S> SnapshotGuard<S> {
    pub fn new(
        view_id: impl Into<String>,
        snapshot: S,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            view_id: view_id.into(),
            snapshot,
            release: Some(Box::new(release)),
            diagnostics: None,
        }
    }

    /// Name of the view this snapshot was taken from
    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Release now instead of at drop
    pub fn release(mut self) {
        self.run_release();
    }

    /// Record this guard's release in `diagnostics`
    pub(crate) fn track(&mut self, diagnostics: Arc<Diagnostics>) {
        diagnostics.record_snapshot_acquired();
        self.diagnostics = Some(diagnostics);
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            if let Some(diagnostics) = &self.diagnostics {
                diagnostics.record_snapshot_released();
            }
        }
    }
}

impl<S> Deref for SnapshotGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.snapshot
    }
}

impl<S> Drop for SnapshotGuard<S> {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl<S> fmt::Debug for SnapshotGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotGuard")
            .field("view_id", &self.view_id)
            .field("released", &self.release.is_none())
            .finish()
    }
}
