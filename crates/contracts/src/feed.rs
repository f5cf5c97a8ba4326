//! Feed abstractions - export client and stream traits
//!
//! The export protocol has no explicit "stream closed" message, so every feed
//! yields an explicit [`StreamOutcome`] as its final item. Consumers never
//! have to guess completion from a raw transport error.

use serde::Serialize;

use crate::{Build, BuildEvent, BuildId, ContractError, StartMarker};

/// Terminal state of a feed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server closed the stream cleanly
    Completed,

    /// The transport failed before a clean close
    Failed { reason: String },
}

impl StreamOutcome {
    /// Create a failed outcome
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Whether the stream ended cleanly
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Short label (used for metrics and logs)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One step of a feed stream: a payload item or the terminal outcome.
#[derive(Debug, Clone)]
pub enum FeedItem<T> {
    /// Next payload on the stream
    Item(T),

    /// The stream is over; no further `Item` will ever be yielded
    End(StreamOutcome),
}

/// A pull-based feed stream.
///
/// Implementations must be idempotent past the end: once `End` has been
/// yielded, every subsequent call yields `End` again with the same outcome.
#[trait_variant::make(FeedStream: Send)]
pub trait LocalFeedStream {
    type Item;

    /// Wait for the next item on the stream
    async fn next_item(&mut self) -> FeedItem<Self::Item>;
}

/// De-duplicated, declaration-ordered set of event type names.
///
/// Sent verbatim as the `eventTypes` query of the per-build feed request, so
/// the server only streams events some handler actually wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EventTypeFilter {
    types: Vec<String>,
}

impl EventTypeFilter {
    /// Build a filter from type names, dropping duplicates but keeping first-seen order
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for t in types {
            let t = t.into();
            if !seen.contains(&t) {
                seen.push(t);
            }
        }
        Self { types: seen }
    }

    /// Type names in declaration order
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Whether a type name is part of the filter
    pub fn contains(&self, event_type: &str) -> bool {
        self.types.iter().any(|t| t == event_type)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Render as the comma-separated `eventTypes` query value
    pub fn to_query(&self) -> String {
        self.types.join(",")
    }
}

/// Export API client.
///
/// Abstracts the two feed endpoints of the export server, supporting the real
/// SSE implementation and mock clients for deterministic tests.
#[trait_variant::make(ExportClient: Send)]
pub trait LocalExportClient {
    /// Stream of build announcements
    type BuildFeed: FeedStream<Item = Build> + Send;

    /// Stream of events scoped to one build
    type EventFeed: FeedStream<Item = BuildEvent> + Send;

    /// Open the long-lived build announcement feed.
    ///
    /// # Arguments
    /// * `since` - start marker: "now" or an absolute epoch-millisecond instant
    async fn open_build_feed(&self, since: StartMarker) -> Result<Self::BuildFeed, ContractError>;

    /// Open the event feed for one build, filtered to the given event types.
    async fn open_event_feed(
        &self,
        build_id: &BuildId,
        filter: &EventTypeFilter,
    ) -> Result<Self::EventFeed, ContractError>;
}
