//! Structured counters for conditions that are logged and swallowed
//!
//! The watcher and the aggregator never surface transient failures to their
//! callers. They record them here instead, so callers and tests can observe
//! suppressed errors without scraping log output.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, lock-free diagnostic sink
#[derive(Debug, Default)]
pub struct Diagnostics {
    events_observed: AtomicU64,
    events_ignored: AtomicU64,
    batches_delivered: AtomicU64,
    notify_failures: AtomicU64,
    observation_errors: AtomicU64,
    registration_failures: AtomicU64,
    directories_registered: AtomicU64,
    views_skipped: AtomicU64,
    snapshots_acquired: AtomicU64,
    snapshots_released: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub events_observed: u64,
    pub events_ignored: u64,
    pub batches_delivered: u64,
    pub notify_failures: u64,
    pub observation_errors: u64,
    pub registration_failures: u64,
    pub directories_registered: u64,
    pub views_skipped: u64,
    pub snapshots_acquired: u64,
    pub snapshots_released: u64,
}

impl DiagnosticsSnapshot {
    /// Snapshots acquired but not yet released
    pub fn outstanding_snapshots(&self) -> u64 {
        self.snapshots_acquired.saturating_sub(self.snapshots_released)
    }
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_event_observed, events_observed);
    counter!(record_event_ignored, events_ignored);
    counter!(record_batch_delivered, batches_delivered);
    counter!(record_notify_failure, notify_failures);
    counter!(record_observation_error, observation_errors);
    counter!(record_registration_failure, registration_failures);
    counter!(record_view_skipped, views_skipped);
    counter!(record_snapshot_acquired, snapshots_acquired);
    counter!(record_snapshot_released, snapshots_released);

    pub fn record_directories_registered(&self, count: u64) {
        self.directories_registered
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            events_observed: self.events_observed.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            observation_errors: self.observation_errors.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            directories_registered: self.directories_registered.load(Ordering::Relaxed),
            views_skipped: self.views_skipped.load(Ordering::Relaxed),
            snapshots_acquired: self.snapshots_acquired.load(Ordering::Relaxed),
            snapshots_released: self.snapshots_released.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let diagnostics = Diagnostics::new();
        diagnostics.record_notify_failure();
        diagnostics.record_notify_failure();
        diagnostics.record_directories_registered(3);

        let snap = diagnostics.snapshot();
        assert_eq!(snap.notify_failures, 2);
        assert_eq!(snap.directories_registered, 3);
        assert_eq!(snap.batches_delivered, 0);
    }

    #[test]
    fn test_outstanding_snapshots() {
        let diagnostics = Arc::new(Diagnostics::new());
        diagnostics.record_snapshot_acquired();
        diagnostics.record_snapshot_acquired();
        diagnostics.record_snapshot_released();
        assert_eq!(diagnostics.snapshot().outstanding_snapshots(), 1);
    }
}
