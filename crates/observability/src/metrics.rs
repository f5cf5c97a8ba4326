//! Dispatch metrics collection module
//!
//! Records admission and dispatch activity to the metrics facade, and keeps
//! an in-memory aggregate for the end-of-run summary.

use contracts::StreamOutcome;
use metrics::{counter, gauge, histogram};

/// Record a build entering processing
///
/// # Arguments
/// * `running` - number of builds being processed after this admission
pub fn record_build_admitted(running: usize) {
    counter!("export_stream_builds_admitted_total").increment(1);
    gauge!("export_stream_builds_running").set(running as f64);
}

/// Record a build's stream reaching terminal state
pub fn record_build_finished(outcome: &StreamOutcome, events_delivered: u64) {
    counter!(
        "export_stream_builds_finished_total",
        "outcome" => outcome.label()
    )
    .increment(1);
    histogram!("export_stream_events_per_build").record(events_delivered as f64);
}

/// Record an announcement rejected or evicted by the bounded pending queue
pub fn record_announcement_dropped(policy: &'static str) {
    counter!(
        "export_stream_announcements_dropped_total",
        "policy" => policy
    )
    .increment(1);
}

/// Record one event routed to its subscribers
pub fn record_event_dispatched(event_type: &str, deliveries: usize) {
    counter!(
        "export_stream_events_dispatched_total",
        "event_type" => event_type.to_string()
    )
    .increment(1);
    counter!("export_stream_handler_deliveries_total").increment(deliveries as u64);
}

/// Record an event whose type had no subscriber
pub fn record_event_ignored(event_type: &str) {
    counter!(
        "export_stream_events_ignored_total",
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

/// Record the pending queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("export_stream_pending_queue_depth").set(depth as f64);
}

/// Feed metrics aggregator
///
/// Aggregates per-build results in memory for the run summary.
#[derive(Debug, Clone, Default)]
pub struct FeedMetricsAggregator {
    /// Builds whose stream completed cleanly
    pub builds_completed: u64,

    /// Builds whose stream failed
    pub builds_failed: u64,

    /// Events delivered per build
    pub events_per_build: RunningStats,

    /// Per-build processing wall time (milliseconds)
    pub processing_ms: RunningStats,
}

impl FeedMetricsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished build
    pub fn record_build(&mut self, outcome: &StreamOutcome, events: u64, elapsed_ms: f64) {
        match outcome {
            StreamOutcome::Completed => self.builds_completed += 1,
            StreamOutcome::Failed { .. } => self.builds_failed += 1,
        }
        self.events_per_build.push(events as f64);
        self.processing_ms.push(elapsed_ms);
    }

    /// Generate a summary report
    pub fn summary(&self) -> FeedSummary {
        let total = self.builds_completed + self.builds_failed;
        FeedSummary {
            builds_completed: self.builds_completed,
            builds_failed: self.builds_failed,
            failure_rate: if total > 0 {
                self.builds_failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            events_per_build: StatsSummary::from(&self.events_per_build),
            processing_ms: StatsSummary::from(&self.processing_ms),
        }
    }

    /// Reset the aggregate
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Aggregated run summary
#[derive(Debug, Clone, Default)]
pub struct FeedSummary {
    pub builds_completed: u64,
    pub builds_failed: u64,
    pub failure_rate: f64,
    pub events_per_build: StatsSummary,
    pub processing_ms: StatsSummary,
}

impl std::fmt::Display for FeedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Feed Summary ===")?;
        writeln!(f, "Builds completed: {}", self.builds_completed)?;
        writeln!(
            f,
            "Builds failed: {} ({:.2}%)",
            self.builds_failed, self.failure_rate
        )?;
        writeln!(f, "Events per build: {}", self.events_per_build)?;
        writeln!(f, "Processing time (ms): {}", self.processing_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = FeedMetricsAggregator::new();

        aggregator.record_build(&StreamOutcome::Completed, 10, 120.0);
        aggregator.record_build(&StreamOutcome::failed("transport error"), 3, 40.0);

        assert_eq!(aggregator.builds_completed, 1);
        assert_eq!(aggregator.builds_failed, 1);

        let summary = aggregator.summary();
        assert_eq!(summary.failure_rate, 50.0);
        assert_eq!(summary.events_per_build.count, 2);
        assert!((summary.events_per_build.mean - 6.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = FeedMetricsAggregator::new();
        aggregator.record_build(&StreamOutcome::Completed, 5, 100.0);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Builds completed: 1"));
        assert!(output.contains("0.00%"));
    }
}
