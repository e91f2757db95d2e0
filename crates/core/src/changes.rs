//! On-disk change model and the notifier boundary
//!
//! A [`ChangeBatch`] is the unit the watcher hands to a [`Notifier`]. The
//! consumer is expected to invalidate idempotently: the same path may appear
//! more than once in a batch, and batches are never retried.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of mutation observed for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Path came into existence
    Created,
    /// Path contents or metadata changed
    Changed,
    /// Path was removed
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One observed filesystem mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Absolute path of the affected file or directory
    pub path: PathBuf,
    /// Kind of change
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Changed)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where a batch of changes came from
///
/// Consumers validate disk-observed edits differently from editor edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOrigin {
    /// Observed on disk by a filesystem watcher
    Disk,
    /// Reported by an editor buffer
    Editor,
}

/// Coalesced set of changes delivered in a single notifier call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    events: Vec<ChangeEvent>,
    origin: ChangeOrigin,
}

impl ChangeBatch {
    /// Create a batch of disk-observed changes
    pub fn from_disk(events: Vec<ChangeEvent>) -> Self {
        Self {
            events,
            origin: ChangeOrigin::Disk,
        }
    }

    pub fn origin(&self) -> ChangeOrigin {
        self.origin
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events recorded for `path`, in arrival order
    pub fn events_for<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a ChangeEvent> {
        self.events.iter().filter(move |e| e.path == path)
    }

    /// True if any event in the batch touches `path`
    pub fn contains_path(&self, path: &Path) -> bool {
        self.events_for(path).next().is_some()
    }
}

/// Change-intake entry point of the workspace engine
///
/// Implementations must tolerate duplicate paths within a batch and across
/// batches. A returned error is logged by the caller and the batch is dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Invalidate whatever the batch's paths affect
    async fn notify_changed(&self, batch: ChangeBatch) -> Result<()>;
}
