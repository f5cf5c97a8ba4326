//! Per-build stream processor
//!
//! Runs one build's event feed from open to terminal state: demultiplexes
//! incoming events through the dispatch table, then fires the completion
//! sequence once. The returned `BuildCompletion` doubles as the scheduler's
//! slot release and is produced on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use contracts::{
    Build, BuildId, EventTypeFilter, ExportClient, FeedItem, FeedStream, StreamOutcome,
};
use handler_factory::DispatchTable;
use observability::{record_event_dispatched, record_event_ignored};

use crate::metrics::SchedulerMetrics;

/// Terminal report of one build's stream.
#[derive(Debug)]
pub struct BuildCompletion {
    pub build_id: BuildId,
    pub outcome: StreamOutcome,
    /// Events delivered to at least one handler
    pub events_delivered: u64,
    /// Wall time from feed open attempt to terminal state
    pub elapsed: Duration,
}

/// Processor for one admitted build.
///
/// State machine: Open -> (event)* -> Closing -> Closed. Event handling is
/// strictly sequential within one build; different builds interleave freely
/// since each has its own feed and processor task.
pub struct BuildStreamProcessor<C: ExportClient> {
    build: Build,
    client: Arc<C>,
    table: DispatchTable,
    filter: EventTypeFilter,
    metrics: Arc<SchedulerMetrics>,
}

impl<C: ExportClient> BuildStreamProcessor<C> {
    pub fn new(
        build: Build,
        client: Arc<C>,
        table: DispatchTable,
        filter: EventTypeFilter,
        metrics: Arc<SchedulerMetrics>,
    ) -> Self {
        Self {
            build,
            client,
            table,
            filter,
            metrics,
        }
    }

    /// Run the stream to terminal state.
    ///
    /// A failed feed open short-circuits to a `Failed` completion; the
    /// completion sequence and the slot release still happen.
    #[instrument(
        name = "build_stream_process",
        skip(self),
        fields(build_id = %self.build.build_id)
    )]
    pub async fn run(mut self) -> BuildCompletion {
        let started = Instant::now();
        let build_id = self.build.build_id.clone();

        let mut feed = match self.client.open_event_feed(&build_id, &self.filter).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(build_id = %build_id, error = %e, "failed to open event feed");
                self.table.complete();
                return BuildCompletion {
                    build_id,
                    outcome: StreamOutcome::failed(e.to_string()),
                    events_delivered: 0,
                    elapsed: started.elapsed(),
                };
            }
        };

        debug!(
            build_id = %build_id,
            handlers = self.table.handler_count(),
            event_types = self.filter.len(),
            "event stream open"
        );

        let mut events_delivered = 0u64;
        let outcome = loop {
            match feed.next_item().await {
                FeedItem::Item(event) => {
                    let deliveries = self.table.dispatch(&event);
                    if deliveries == 0 {
                        // Should not occur given the filter, but tolerated.
                        self.metrics.inc_events_ignored();
                        record_event_ignored(&event.event_type);
                    } else {
                        events_delivered += 1;
                        self.metrics.add_events_delivered(1);
                        record_event_dispatched(&event.event_type, deliveries);
                    }
                }
                FeedItem::End(outcome) => break outcome,
            }
        };

        // Closing: completion hooks fire exactly once, table-guarded.
        self.table.complete();

        debug!(
            build_id = %build_id,
            events = events_delivered,
            outcome = outcome.label(),
            "event stream closed"
        );

        BuildCompletion {
            build_id,
            outcome,
            events_delivered,
            elapsed: started.elapsed(),
        }
    }
}
