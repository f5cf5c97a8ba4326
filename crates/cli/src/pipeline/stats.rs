//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::SchedulerSnapshot;
use observability::FeedSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total builds announced on the top-level feed
    pub builds_announced: u64,

    /// Builds admitted for processing
    pub builds_admitted: u64,

    /// Builds whose stream completed cleanly
    pub builds_completed: u64,

    /// Builds whose stream failed
    pub builds_failed: u64,

    /// Announcements rejected or evicted by the bounded pending queue
    pub announcements_dropped: u64,

    /// Events delivered to at least one handler
    pub events_delivered: u64,

    /// Events whose type had no subscriber
    pub events_ignored: u64,

    /// Highest pending queue depth observed
    pub peak_queue_depth: usize,

    /// Highest concurrent build count observed
    pub peak_running: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Aggregated per-build summary
    pub feed_summary: FeedSummary,
}

impl PipelineStats {
    /// Assemble run statistics from the scheduler snapshot and summary
    pub fn from_parts(
        snapshot: SchedulerSnapshot,
        feed_summary: FeedSummary,
        duration: Duration,
    ) -> Self {
        Self {
            builds_announced: snapshot.builds_enqueued + snapshot.announcements_dropped,
            builds_admitted: snapshot.builds_admitted,
            builds_completed: snapshot.builds_completed,
            builds_failed: snapshot.builds_failed,
            announcements_dropped: snapshot.announcements_dropped,
            events_delivered: snapshot.events_delivered,
            events_ignored: snapshot.events_ignored,
            peak_queue_depth: snapshot.peak_queue_depth,
            peak_running: snapshot.peak_running,
            duration,
            feed_summary,
        }
    }

    /// Builds processed per minute
    pub fn builds_per_minute(&self) -> f64 {
        let minutes = self.duration.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            (self.builds_completed + self.builds_failed) as f64 / minutes
        } else {
            0.0
        }
    }

    /// Failed share of terminal builds, as a percentage
    pub fn failure_rate(&self) -> f64 {
        let total = self.builds_completed + self.builds_failed;
        if total > 0 {
            (self.builds_failed as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Export Stream Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Builds announced: {}", self.builds_announced);
        println!("   ├─ Builds admitted: {}", self.builds_admitted);
        println!("   ├─ Builds completed: {}", self.builds_completed);
        println!(
            "   ├─ Builds failed: {} ({:.2}%)",
            self.builds_failed,
            self.failure_rate()
        );
        println!("   ├─ Builds/min: {:.2}", self.builds_per_minute());
        println!("   └─ Peak concurrency: {}", self.peak_running);

        println!("\n📈 Dispatch");
        println!("   ├─ Events delivered: {}", self.events_delivered);
        println!("   ├─ Events ignored: {}", self.events_ignored);
        println!(
            "   ├─ Announcements dropped: {}",
            self.announcements_dropped
        );
        println!("   ├─ Peak queue depth: {}", self.peak_queue_depth);
        println!(
            "   ├─ Events per build: {}",
            self.feed_summary.events_per_build
        );
        println!(
            "   └─ Processing time (ms): {}",
            self.feed_summary.processing_ms
        );
    }
}
