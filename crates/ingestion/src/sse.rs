//! SSE export client
//!
//! Real implementation of the `ExportClient` contract on top of
//! `reqwest-eventsource`. The export protocol has no explicit close message;
//! this layer turns the transport's end-of-stream condition into an explicit
//! `StreamOutcome` so downstream code never interprets raw error callbacks.

use futures::StreamExt;
use metrics::counter;
use reqwest_eventsource::{Error as SseError, Event, EventSource};
use tracing::{debug, instrument, warn};

use contracts::{
    Build, BuildEvent, BuildId, ContractError, EventTypeFilter, ExportClient, FeedItem, FeedStream,
    StartMarker, StreamOutcome,
};

use crate::error::{IngestionError, Result};

/// SSE message name carrying a build announcement
const MESSAGE_BUILD: &str = "Build";

/// SSE message name carrying a build event
const MESSAGE_BUILD_EVENT: &str = "BuildEvent";

/// Export API client over server-sent events.
#[derive(Clone)]
pub struct SseExportClient {
    base_url: String,
    http: reqwest::Client,
}

impl SseExportClient {
    /// Create a client for the given export server.
    ///
    /// # Errors
    /// The URL must be non-empty and use an http(s) scheme.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/').to_string();
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(IngestionError::InvalidBaseUrl {
                url: base_url,
                message: "expected http(s) scheme".into(),
            });
        }

        Ok(Self {
            base_url: trimmed,
            http: reqwest::Client::new(),
        })
    }

    /// Server base URL (scheme + host, no trailing slash)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_feed_url(&self, since: StartMarker) -> String {
        format!(
            "{}/build-export/v1/builds/since/{}?stream",
            self.base_url, since
        )
    }

    fn event_feed_url(&self, build_id: &BuildId, filter: &EventTypeFilter) -> String {
        format!(
            "{}/build-export/v1/build/{}/events?eventTypes={}",
            self.base_url,
            build_id,
            filter.to_query()
        )
    }
}

impl ExportClient for SseExportClient {
    type BuildFeed = SseBuildFeed;
    type EventFeed = SseEventFeed;

    #[instrument(name = "sse_open_build_feed", skip(self), fields(since = %since))]
    async fn open_build_feed(&self, since: StartMarker) -> std::result::Result<Self::BuildFeed, ContractError> {
        let url = self.build_feed_url(since);
        debug!(url = %url, "opening announcement feed");

        let source = EventSource::new(self.http.get(&url))
            .map_err(|e| ContractError::feed_connection(e.to_string()))?;

        Ok(SseBuildFeed { source })
    }

    #[instrument(
        name = "sse_open_event_feed",
        skip(self, filter),
        fields(build_id = %build_id, event_types = filter.len())
    )]
    async fn open_event_feed(
        &self,
        build_id: &BuildId,
        filter: &EventTypeFilter,
    ) -> std::result::Result<Self::EventFeed, ContractError> {
        let url = self.event_feed_url(build_id, filter);
        debug!(url = %url, "opening event feed");

        let source = EventSource::new(self.http.get(&url))
            .map_err(|e| ContractError::feed_connection(e.to_string()))?;

        Ok(SseEventFeed {
            build_id: build_id.clone(),
            source,
            outcome: None,
        })
    }
}

/// The long-lived announcement stream.
///
/// Transport errors are logged and the subscription stays open: the
/// underlying `EventSource` reconnects on its own, so a flaky connection
/// shows up as warnings, not as stream end.
pub struct SseBuildFeed {
    source: EventSource,
}

impl FeedStream for SseBuildFeed {
    type Item = Build;

    async fn next_item(&mut self) -> FeedItem<Build> {
        loop {
            match self.source.next().await {
                Some(Ok(Event::Open)) => {
                    debug!("announcement feed connected");
                }
                Some(Ok(Event::Message(msg))) => {
                    if let Some(build) = parse_announcement(&msg) {
                        return FeedItem::Item(build);
                    }
                }
                Some(Err(SseError::StreamEnded)) => {
                    debug!("announcement feed disconnected, reconnecting");
                }
                Some(Err(e)) => {
                    counter!("export_stream_feed_errors_total", "feed" => "builds").increment(1);
                    warn!(error = %e, "announcement feed error, subscription stays open");
                }
                None => return FeedItem::End(StreamOutcome::Completed),
            }
        }
    }
}

/// One build's event stream.
///
/// The first terminal condition (clean close or transport failure) is
/// latched: the source is closed and every subsequent call yields the same
/// `End` again.
pub struct SseEventFeed {
    build_id: BuildId,
    source: EventSource,
    outcome: Option<StreamOutcome>,
}

impl SseEventFeed {
    fn finish(&mut self, outcome: StreamOutcome) -> FeedItem<BuildEvent> {
        self.source.close();
        self.outcome = Some(outcome.clone());
        FeedItem::End(outcome)
    }
}

impl FeedStream for SseEventFeed {
    type Item = BuildEvent;

    async fn next_item(&mut self) -> FeedItem<BuildEvent> {
        if let Some(outcome) = &self.outcome {
            return FeedItem::End(outcome.clone());
        }

        loop {
            match self.source.next().await {
                Some(Ok(Event::Open)) => {
                    debug!(build_id = %self.build_id, "event feed connected");
                }
                Some(Ok(Event::Message(msg))) => {
                    if let Some(event) = parse_event(&self.build_id, &msg) {
                        return FeedItem::Item(event);
                    }
                }
                Some(Err(SseError::StreamEnded)) => {
                    return self.finish(StreamOutcome::Completed);
                }
                Some(Err(e)) => {
                    counter!("export_stream_feed_errors_total", "feed" => "events").increment(1);
                    return self.finish(StreamOutcome::failed(e.to_string()));
                }
                None => return self.finish(StreamOutcome::Completed),
            }
        }
    }
}

/// Parse one announcement message; parse failures are logged and skipped
fn parse_announcement(msg: &eventsource_stream::Event) -> Option<Build> {
    if msg.data.is_empty() || msg.data == "keepalive" {
        return None;
    }
    if msg.event != MESSAGE_BUILD {
        debug!(event = %msg.event, "unexpected message on announcement feed, skipping");
        return None;
    }

    match serde_json::from_str::<Build>(&msg.data) {
        Ok(build) => Some(build),
        Err(e) => {
            counter!("export_stream_parse_errors_total", "feed" => "builds").increment(1);
            warn!(error = %e, data = %msg.data, "malformed announcement payload, skipping");
            None
        }
    }
}

/// Parse one build event message; parse failures are logged and skipped so
/// a single malformed payload never aborts the stream (and never leaks the
/// build's concurrency slot).
fn parse_event(build_id: &BuildId, msg: &eventsource_stream::Event) -> Option<BuildEvent> {
    if msg.data.is_empty() || msg.data == "keepalive" {
        return None;
    }
    if msg.event != MESSAGE_BUILD_EVENT {
        debug!(
            build_id = %build_id,
            event = %msg.event,
            "unexpected message on event feed, skipping"
        );
        return None;
    }

    match serde_json::from_str::<BuildEvent>(&msg.data) {
        Ok(event) => Some(event),
        Err(e) => {
            counter!("export_stream_parse_errors_total", "feed" => "events").increment(1);
            warn!(
                build_id = %build_id,
                error = %e,
                "malformed event payload, skipping"
            );
            None
        }
    }
}
