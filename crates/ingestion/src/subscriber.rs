//! Top-level feed subscriber
//!
//! Runs the long-lived build announcement subscription and hands each parsed
//! announcement to the admission side through a channel. The channel is the
//! only coupling: the subscriber knows nothing about scheduling.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use contracts::{Build, ExportClient, FeedItem, FeedStream, StartMarker, StreamOutcome};

/// Long-lived build announcement subscription.
pub struct BuildFeedSubscriber<C: ExportClient> {
    client: Arc<C>,
}

impl<C: ExportClient> BuildFeedSubscriber<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Run the subscription until the feed ends or the receiving side stops
    /// accepting builds.
    ///
    /// Each announcement is sent into `announcements`; a closed channel means
    /// the scheduler has shut down, which ends the subscription cleanly.
    #[instrument(name = "build_feed_subscribe", skip(self, announcements), fields(since = %since))]
    pub async fn run(
        self,
        since: StartMarker,
        announcements: mpsc::UnboundedSender<Build>,
    ) -> StreamOutcome {
        let mut feed = match self.client.open_build_feed(since).await {
            Ok(feed) => feed,
            Err(e) => {
                error!(error = %e, "failed to open announcement feed");
                return StreamOutcome::failed(e.to_string());
            }
        };

        info!("announcement feed subscription started");

        let outcome = loop {
            match feed.next_item().await {
                FeedItem::Item(build) => {
                    counter!("export_stream_builds_announced_total").increment(1);
                    debug!(build_id = %build.build_id, "build announced");
                    if announcements.send(build).is_err() {
                        info!("scheduler stopped accepting builds, ending subscription");
                        break StreamOutcome::Completed;
                    }
                }
                FeedItem::End(outcome) => break outcome,
            }
        };

        match &outcome {
            StreamOutcome::Completed => info!("announcement feed ended"),
            StreamOutcome::Failed { reason } => {
                warn!(reason = %reason, "announcement feed failed")
            }
        }
        outcome
    }
}
