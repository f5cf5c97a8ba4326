//! Admission scheduler
//!
//! Owns the FIFO pending queue and the concurrency counter. All queue and
//! counter mutations happen inside the scheduler's own task, so the
//! admission invariants hold without locks: a build is admitted exactly
//! once, admission follows strict FIFO order, and the counter never exceeds
//! the configured ceiling.
//!
//! Re-scheduling after a release goes through the scheduler's message queue
//! rather than a direct call, so a burst of near-simultaneous releases
//! cannot grow the stack, and announcements arriving in between get fair
//! consideration.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use contracts::{Build, EventTypeFilter, ExportClient, SchedulerConfig, OverflowPolicy, StreamOutcome};
use handler_factory::HandlerFactory;
use observability::{
    record_announcement_dropped, record_build_admitted, record_build_finished, record_queue_depth,
    FeedMetricsAggregator,
};

use crate::metrics::SchedulerMetrics;
use crate::processor::{BuildCompletion, BuildStreamProcessor};

/// The admission scheduler.
///
/// Consumes announcements from an unbounded channel (the sender side lives
/// with the feed subscriber) and per-build completions from its internal
/// release channel. The run loop ends when the announcement side closes and
/// every in-flight stream has released its slot.
pub struct AdmissionScheduler<C: ExportClient> {
    config: SchedulerConfig,
    max_builds: Option<u64>,
    client: Arc<C>,
    factory: Arc<HandlerFactory>,
    filter: EventTypeFilter,

    pending: VecDeque<Build>,
    running: usize,
    finished: u64,

    build_rx: mpsc::UnboundedReceiver<Build>,
    release_tx: mpsc::UnboundedSender<BuildCompletion>,
    release_rx: mpsc::UnboundedReceiver<BuildCompletion>,

    metrics: Arc<SchedulerMetrics>,
    summary: Arc<Mutex<FeedMetricsAggregator>>,
}

impl<C> AdmissionScheduler<C>
where
    C: ExportClient + Send + Sync + 'static,
    C::EventFeed: 'static,
{
    /// Create a scheduler and the announcement sender feeding it.
    pub fn new(
        config: SchedulerConfig,
        client: Arc<C>,
        factory: Arc<HandlerFactory>,
        filter: EventTypeFilter,
    ) -> (Self, mpsc::UnboundedSender<Build>) {
        let (build_tx, build_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            config,
            max_builds: None,
            client,
            factory,
            filter,
            pending: VecDeque::new(),
            running: 0,
            finished: 0,
            build_rx,
            release_tx,
            release_rx,
            metrics: Arc::new(SchedulerMetrics::new()),
            summary: Arc::new(Mutex::new(FeedMetricsAggregator::new())),
        };

        (scheduler, build_tx)
    }

    /// Stop after this many builds have reached terminal state (None = run
    /// until the announcement feed ends).
    pub fn with_max_builds(mut self, limit: Option<u64>) -> Self {
        self.max_builds = limit;
        self
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Shared run-summary aggregate
    pub fn summary(&self) -> Arc<Mutex<FeedMetricsAggregator>> {
        Arc::clone(&self.summary)
    }

    /// Run the admission loop to completion.
    #[instrument(
        name = "admission_scheduler_run",
        skip(self),
        fields(max_concurrent = self.config.max_concurrent)
    )]
    pub async fn run(mut self) {
        info!(
            max_concurrent = self.config.max_concurrent,
            queue_capacity = ?self.config.queue_capacity,
            max_builds = ?self.max_builds,
            "admission scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                Some(done) = self.release_rx.recv() => {
                    self.finish(done);
                    if self.limit_reached() {
                        break;
                    }
                    self.attempt_admission();
                }

                build = self.build_rx.recv() => match build {
                    Some(build) => {
                        self.enqueue(build);
                        self.attempt_admission();
                    }
                    None => break,
                }
            }
        }

        // Announcement side is done (or the build limit was hit): drain the
        // in-flight streams and whatever the queue still holds.
        self.attempt_admission();
        while self.running > 0 && !self.limit_reached() {
            match self.release_rx.recv().await {
                Some(done) => {
                    self.finish(done);
                    self.attempt_admission();
                }
                None => break,
            }
        }

        if !self.pending.is_empty() {
            info!(
                pending = self.pending.len(),
                "scheduler stopping with unprocessed pending builds"
            );
        }
        if self.running > 0 {
            debug!(
                running = self.running,
                "abandoning in-flight streams past the build limit"
            );
        }

        info!(
            completed = self.metrics.builds_completed(),
            failed = self.metrics.builds_failed(),
            "admission scheduler stopped"
        );
    }

    /// Append an announcement to the pending queue, honoring the bound.
    fn enqueue(&mut self, build: Build) {
        if let Some(capacity) = self.config.queue_capacity {
            if self.pending.len() >= capacity {
                match self.config.overflow_policy {
                    OverflowPolicy::DropNewest => {
                        warn!(
                            build_id = %build.build_id,
                            capacity,
                            "pending queue full, rejecting announcement"
                        );
                        self.metrics.inc_dropped();
                        record_announcement_dropped("drop_newest");
                        return;
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = self.pending.pop_front() {
                            warn!(
                                build_id = %evicted.build_id,
                                capacity,
                                "pending queue full, evicting oldest announcement"
                            );
                            self.metrics.inc_dropped();
                            record_announcement_dropped("drop_oldest");
                        }
                    }
                }
            }
        }

        debug!(build_id = %build.build_id, depth = self.pending.len() + 1, "build enqueued");
        self.metrics.inc_enqueued();
        self.pending.push_back(build);
        self.metrics.set_queue_depth(self.pending.len());
    }

    /// Admit pending builds while a slot is free.
    fn attempt_admission(&mut self) {
        while self.running < self.config.max_concurrent {
            let Some(build) = self.pending.pop_front() else {
                break;
            };
            self.admit(build);
        }
        let depth = self.pending.len();
        self.metrics.set_queue_depth(depth);
        record_queue_depth(depth);
    }

    /// Start a stream processor for one build.
    fn admit(&mut self, build: Build) {
        self.running += 1;
        self.metrics.inc_admitted();
        self.metrics.set_running(self.running);
        record_build_admitted(self.running);

        debug!(
            build_id = %build.build_id,
            running = self.running,
            "build admitted"
        );

        let table = self.factory.create_dispatch_table(&build);
        let processor = BuildStreamProcessor::new(
            build,
            Arc::clone(&self.client),
            table,
            self.filter.clone(),
            Arc::clone(&self.metrics),
        );

        // The completion message is the slot release; the processor produces
        // it on every exit path, including a failed feed open.
        let release_tx = self.release_tx.clone();
        tokio::spawn(async move {
            let done = processor.run().await;
            let _ = release_tx.send(done);
        });
    }

    /// Account for one finished build and release its slot.
    fn finish(&mut self, done: BuildCompletion) {
        self.running -= 1;
        self.finished += 1;
        self.metrics.set_running(self.running);

        match &done.outcome {
            StreamOutcome::Completed => {
                self.metrics.inc_completed();
                info!(
                    build_id = %done.build_id,
                    events = done.events_delivered,
                    elapsed_ms = done.elapsed.as_millis() as u64,
                    "build stream completed"
                );
            }
            StreamOutcome::Failed { reason } => {
                self.metrics.inc_failed();
                warn!(
                    build_id = %done.build_id,
                    reason = %reason,
                    "build stream failed"
                );
            }
        }

        record_build_finished(&done.outcome, done.events_delivered);
        self.summary.lock().unwrap().record_build(
            &done.outcome,
            done.events_delivered,
            done.elapsed.as_secs_f64() * 1000.0,
        );
    }

    fn limit_reached(&self) -> bool {
        self.max_builds.is_some_and(|limit| self.finished >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::{MockExportClient, MockFeedConfig, ScriptedBuild};
    use std::time::Duration;

    fn scheduler_config(max_concurrent: usize) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent,
            queue_capacity: None,
            overflow_policy: OverflowPolicy::default(),
        }
    }

    fn empty_factory() -> Arc<HandlerFactory> {
        Arc::new(HandlerFactory::new(vec![]))
    }

    async fn run_with_builds(
        config: SchedulerConfig,
        client: Arc<MockExportClient>,
        builds: &[&str],
    ) -> Arc<SchedulerMetrics> {
        let filter = EventTypeFilter::new(["BuildStarted"]);
        let (scheduler, tx) =
            AdmissionScheduler::new(config, Arc::clone(&client), empty_factory(), filter);
        let metrics = scheduler.metrics();

        let handle = tokio::spawn(scheduler.run());
        for id in builds {
            tx.send(Build::with_id(*id)).unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        metrics
    }

    #[tokio::test]
    async fn single_slot_is_strict_fifo() {
        let scripts = vec![
            ScriptedBuild::new("b1").hold_open(Duration::from_millis(20)),
            ScriptedBuild::new("b2").hold_open(Duration::from_millis(20)),
        ];
        let client = Arc::new(MockExportClient::new(scripts));

        let metrics = run_with_builds(scheduler_config(1), Arc::clone(&client), &["b1", "b2"]).await;

        assert_eq!(
            client.journal(),
            vec!["open:b1", "closed:b1", "open:b2", "closed:b2"]
        );
        assert_eq!(client.peak_open_streams(), 1);
        assert_eq!(metrics.builds_completed(), 2);
    }

    #[tokio::test]
    async fn ceiling_never_exceeded() {
        let ids = ["b1", "b2", "b3", "b4", "b5"];
        let scripts = ids
            .iter()
            .map(|id| ScriptedBuild::new(id).hold_open(Duration::from_millis(15)))
            .collect();
        let client = Arc::new(MockExportClient::new(scripts));

        let metrics = run_with_builds(scheduler_config(2), Arc::clone(&client), &ids).await;

        assert!(client.peak_open_streams() <= 2);
        assert_eq!(metrics.builds_admitted(), 5);
        assert_eq!(metrics.builds_completed(), 5);
        assert_eq!(metrics.running(), 0);
    }

    #[tokio::test]
    async fn bounded_queue_rejects_newest() {
        let scripts = vec![
            ScriptedBuild::new("b1").hold_open(Duration::from_millis(40)),
            ScriptedBuild::new("b2").hold_open(Duration::from_millis(10)),
            ScriptedBuild::new("b3").hold_open(Duration::from_millis(10)),
        ];
        let client = Arc::new(MockExportClient::new(scripts));
        let config = SchedulerConfig {
            max_concurrent: 1,
            queue_capacity: Some(1),
            overflow_policy: OverflowPolicy::DropNewest,
        };

        // b1 admitted immediately, b2 queued, b3 rejected
        let metrics = run_with_builds(config, Arc::clone(&client), &["b1", "b2", "b3"]).await;

        assert_eq!(metrics.announcements_dropped(), 1);
        assert_eq!(metrics.builds_completed(), 2);
        let journal = client.journal();
        assert!(journal.contains(&"open:b1".to_string()));
        assert!(journal.contains(&"open:b2".to_string()));
        assert!(!journal.contains(&"open:b3".to_string()));
    }

    #[tokio::test]
    async fn bounded_queue_evicts_oldest() {
        let scripts = vec![
            ScriptedBuild::new("b1").hold_open(Duration::from_millis(40)),
            ScriptedBuild::new("b2").hold_open(Duration::from_millis(10)),
            ScriptedBuild::new("b3").hold_open(Duration::from_millis(10)),
        ];
        let client = Arc::new(MockExportClient::new(scripts));
        let config = SchedulerConfig {
            max_concurrent: 1,
            queue_capacity: Some(1),
            overflow_policy: OverflowPolicy::DropOldest,
        };

        // b1 admitted immediately, b2 queued then evicted by b3
        let metrics = run_with_builds(config, Arc::clone(&client), &["b1", "b2", "b3"]).await;

        assert_eq!(metrics.announcements_dropped(), 1);
        let journal = client.journal();
        assert!(journal.contains(&"open:b3".to_string()));
        assert!(!journal.contains(&"open:b2".to_string()));
    }

    #[tokio::test]
    async fn slot_released_when_feed_open_fails() {
        let config = MockFeedConfig {
            fail_event_feed: vec!["b1".into()],
            ..Default::default()
        };
        let scripts = vec![ScriptedBuild::new("b1"), ScriptedBuild::new("b2")];
        let client = Arc::new(MockExportClient::with_config(scripts, config));

        let metrics =
            run_with_builds(scheduler_config(1), Arc::clone(&client), &["b1", "b2"]).await;

        assert_eq!(metrics.builds_failed(), 1);
        assert_eq!(metrics.builds_completed(), 1);
        assert!(client.journal().contains(&"open:b2".to_string()));
    }

    #[tokio::test]
    async fn max_builds_limit_stops_the_loop() {
        let scripts = vec![
            ScriptedBuild::new("b1"),
            ScriptedBuild::new("b2"),
            ScriptedBuild::new("b3"),
        ];
        let client = Arc::new(MockExportClient::new(scripts));
        let filter = EventTypeFilter::new(["BuildStarted"]);
        let (scheduler, tx) = AdmissionScheduler::new(
            scheduler_config(1),
            Arc::clone(&client),
            empty_factory(),
            filter,
        );
        let scheduler = scheduler.with_max_builds(Some(2));
        let metrics = scheduler.metrics();

        let handle = tokio::spawn(scheduler.run());
        for id in ["b1", "b2", "b3"] {
            tx.send(Build::with_id(id)).unwrap();
        }
        // Sender stays alive: the limit alone must stop the loop.
        handle.await.unwrap();
        drop(tx);

        assert_eq!(metrics.builds_completed() + metrics.builds_failed(), 2);
    }
}
