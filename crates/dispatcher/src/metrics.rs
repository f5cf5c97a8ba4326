//! Scheduler metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for the admission scheduler and its stream processors
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Builds appended to the pending queue
    builds_enqueued: AtomicU64,
    /// Builds admitted for processing
    builds_admitted: AtomicU64,
    /// Builds whose stream completed cleanly
    builds_completed: AtomicU64,
    /// Builds whose stream failed
    builds_failed: AtomicU64,
    /// Announcements rejected or evicted by the bounded queue
    announcements_dropped: AtomicU64,
    /// Events delivered to at least one handler
    events_delivered: AtomicU64,
    /// Events whose type had no subscriber
    events_ignored: AtomicU64,
    /// Current pending queue depth
    queue_depth: AtomicUsize,
    /// Highest pending queue depth observed
    peak_queue_depth: AtomicUsize,
    /// Builds currently being processed
    running: AtomicUsize,
    /// Highest concurrent build count observed
    peak_running: AtomicUsize,
}

impl SchedulerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds_enqueued(&self) -> u64 {
        self.builds_enqueued.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued(&self) {
        self.builds_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn builds_admitted(&self) -> u64 {
        self.builds_admitted.load(Ordering::Relaxed)
    }

    pub fn inc_admitted(&self) {
        self.builds_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn builds_completed(&self) -> u64 {
        self.builds_completed.load(Ordering::Relaxed)
    }

    pub fn inc_completed(&self) {
        self.builds_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn builds_failed(&self) -> u64 {
        self.builds_failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn announcements_dropped(&self) -> u64 {
        self.announcements_dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.announcements_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    pub fn add_events_delivered(&self, n: u64) {
        self.events_delivered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn events_ignored(&self) -> u64 {
        self.events_ignored.load(Ordering::Relaxed)
    }

    pub fn inc_events_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Set current queue depth, tracking the peak
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
        self.peak_queue_depth.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn peak_queue_depth(&self) -> usize {
        self.peak_queue_depth.load(Ordering::Relaxed)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }

    /// Set current running count, tracking the peak
    pub fn set_running(&self, running: usize) {
        self.running.store(running, Ordering::Relaxed);
        self.peak_running.fetch_max(running, Ordering::Relaxed);
    }

    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            builds_enqueued: self.builds_enqueued(),
            builds_admitted: self.builds_admitted(),
            builds_completed: self.builds_completed(),
            builds_failed: self.builds_failed(),
            announcements_dropped: self.announcements_dropped(),
            events_delivered: self.events_delivered(),
            events_ignored: self.events_ignored(),
            queue_depth: self.queue_depth(),
            peak_queue_depth: self.peak_queue_depth(),
            running: self.running(),
            peak_running: self.peak_running(),
        }
    }
}

/// Snapshot of scheduler metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerSnapshot {
    pub builds_enqueued: u64,
    pub builds_admitted: u64,
    pub builds_completed: u64,
    pub builds_failed: u64,
    pub announcements_dropped: u64,
    pub events_delivered: u64,
    pub events_ignored: u64,
    pub queue_depth: usize,
    pub peak_queue_depth: usize,
    pub running: usize,
    pub peak_running: usize,
}
