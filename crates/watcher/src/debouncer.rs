//! Quiet-period coalescing of change events
//!
//! One pending batch and one deadline. Every push moves the deadline to
//! `now + window`, so a batch only closes after the stream goes quiet.

use std::time::Duration;
use tokio::time::Instant;
use wsync_core::ChangeEvent;

/// Pending batch with a resettable quiet-period deadline
#[derive(Debug)]
pub(crate) struct BatchDebouncer {
    /// Debounce window duration
    window: Duration,
    /// Events accumulated since the last flush
    pending: Vec<ChangeEvent>,
    /// When the pending batch closes, if anything is pending
    deadline: Option<Instant>,
}

impl BatchDebouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Append an event observed at `now` and restart the quiet period
    pub(crate) fn push_at(&mut self, event: ChangeEvent, now: Instant) {
        self.pending.push(event);
        self.deadline = Some(now + self.window);
    }

    pub(crate) fn push(&mut self, event: ChangeEvent) {
        self.push_at(event, Instant::now());
    }

    /// Schedule a flush at `now + window` without queueing an event
    pub(crate) fn arm_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub(crate) fn arm(&mut self) {
        self.arm_at(Instant::now());
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the quiet period has elapsed at `now`
    pub(crate) fn is_ready_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Take everything pending and clear the deadline
    pub(crate) fn take(&mut self) -> Vec<ChangeEvent> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    /// Drop pending events without delivering them, returning how many
    pub(crate) fn discard(&mut self) -> usize {
        self.take().len()
    }
}
