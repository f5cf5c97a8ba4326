//! Mock export client
//!
//! Scriptable `ExportClient` implementation for unit and e2e tests, with
//! injectable failure scenarios. Records a journal of feed opens/closes so
//! tests can assert admission order and concurrency ceilings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use contracts::{
    Build, BuildEvent, BuildId, ContractError, EventTypeFilter, ExportClient, FeedItem, FeedStream,
    StartMarker, StreamOutcome,
};

/// Scripted timeline for one build's event feed
#[derive(Debug, Clone)]
pub struct ScriptedBuild {
    /// The announcement
    pub build: Build,
    /// Events emitted on the per-build feed, in order
    pub events: Vec<BuildEvent>,
    /// Terminal outcome of the feed
    pub outcome: StreamOutcome,
    /// Delay between the last event and the terminal signal
    pub hold_open: Duration,
    /// Emit the terminal signal twice (close-once guard scenarios)
    pub duplicate_terminal: bool,
}

impl ScriptedBuild {
    /// Script with no events that completes immediately
    pub fn new(build_id: &str) -> Self {
        Self {
            build: Build::with_id(build_id),
            events: Vec::new(),
            outcome: StreamOutcome::Completed,
            hold_open: Duration::ZERO,
            duplicate_terminal: false,
        }
    }

    pub fn with_events(mut self, events: Vec<BuildEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_outcome(mut self, outcome: StreamOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn hold_open(mut self, hold: Duration) -> Self {
        self.hold_open = hold;
        self
    }

    pub fn duplicate_terminal(mut self) -> Self {
        self.duplicate_terminal = true;
        self
    }
}

/// Mock client configuration (injectable failure scenarios)
#[derive(Debug, Clone, Default)]
pub struct MockFeedConfig {
    /// Delay between announcements on the top-level feed
    pub announce_gap: Duration,
    /// Builds whose event feed fails to open
    pub fail_event_feed: Vec<BuildId>,
    /// Deliver scripted events even when their type is outside the filter
    /// (emulates a server ignoring the eventTypes query)
    pub deliver_unfiltered: bool,
}

/// Mock export client
pub struct MockExportClient {
    config: MockFeedConfig,
    scripts: Vec<ScriptedBuild>,
    journal: Arc<Mutex<Vec<String>>>,
    filters_seen: Arc<Mutex<Vec<Vec<String>>>>,
    open_streams: Arc<AtomicUsize>,
    peak_open_streams: Arc<AtomicUsize>,
}

impl MockExportClient {
    /// Create a mock client announcing the given scripts in order
    pub fn new(scripts: Vec<ScriptedBuild>) -> Self {
        Self::with_config(scripts, MockFeedConfig::default())
    }

    /// Create with failure configuration
    pub fn with_config(scripts: Vec<ScriptedBuild>, config: MockFeedConfig) -> Self {
        Self {
            config,
            scripts,
            journal: Arc::new(Mutex::new(Vec::new())),
            filters_seen: Arc::new(Mutex::new(Vec::new())),
            open_streams: Arc::new(AtomicUsize::new(0)),
            peak_open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Ordered open/close journal, entries like "open:b1" / "closed:b1"
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Event-type filters received by `open_event_feed`, in call order
    pub fn filters_seen(&self) -> Vec<Vec<String>> {
        self.filters_seen.lock().unwrap().clone()
    }

    /// Highest number of simultaneously open event feeds observed
    pub fn peak_open_streams(&self) -> usize {
        self.peak_open_streams.load(Ordering::SeqCst)
    }

    fn record_open(&self, build_id: &BuildId) {
        self.journal.lock().unwrap().push(format!("open:{build_id}"));
        let now = self.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open_streams.fetch_max(now, Ordering::SeqCst);
    }
}

impl ExportClient for MockExportClient {
    type BuildFeed = MockBuildFeed;
    type EventFeed = MockEventFeed;

    async fn open_build_feed(
        &self,
        _since: StartMarker,
    ) -> Result<Self::BuildFeed, ContractError> {
        Ok(MockBuildFeed {
            pending: self.scripts.iter().map(|s| s.build.clone()).collect(),
            gap: self.config.announce_gap,
        })
    }

    async fn open_event_feed(
        &self,
        build_id: &BuildId,
        filter: &EventTypeFilter,
    ) -> Result<Self::EventFeed, ContractError> {
        self.filters_seen
            .lock()
            .unwrap()
            .push(filter.types().to_vec());

        if self.config.fail_event_feed.contains(build_id) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("refused:{build_id}"));
            return Err(ContractError::feed_connection(format!(
                "event feed refused for build '{build_id}'"
            )));
        }

        let script = self.scripts.iter().find(|s| s.build.build_id == *build_id);
        self.record_open(build_id);

        let mut items: VecDeque<FeedItem<BuildEvent>> = VecDeque::new();
        let mut hold_open = Duration::ZERO;
        match script {
            Some(script) => {
                for event in &script.events {
                    if self.config.deliver_unfiltered || filter.contains(&event.event_type) {
                        items.push_back(FeedItem::Item(event.clone()));
                    }
                }
                items.push_back(FeedItem::End(script.outcome.clone()));
                if script.duplicate_terminal {
                    items.push_back(FeedItem::End(script.outcome.clone()));
                }
                hold_open = script.hold_open;
            }
            None => {
                debug!(build_id = %build_id, "no script for build, empty stream");
                items.push_back(FeedItem::End(StreamOutcome::Completed));
            }
        }

        Ok(MockEventFeed {
            build_id: build_id.clone(),
            items,
            hold_open,
            journal: Arc::clone(&self.journal),
            open_streams: Arc::clone(&self.open_streams),
            closed: false,
        })
    }
}

/// Scripted announcement stream
pub struct MockBuildFeed {
    pending: VecDeque<Build>,
    gap: Duration,
}

impl FeedStream for MockBuildFeed {
    type Item = Build;

    async fn next_item(&mut self) -> FeedItem<Build> {
        match self.pending.pop_front() {
            Some(build) => {
                if !self.gap.is_zero() {
                    sleep(self.gap).await;
                }
                FeedItem::Item(build)
            }
            None => FeedItem::End(StreamOutcome::Completed),
        }
    }
}

/// Scripted per-build event stream
pub struct MockEventFeed {
    build_id: BuildId,
    items: VecDeque<FeedItem<BuildEvent>>,
    hold_open: Duration,
    journal: Arc<Mutex<Vec<String>>>,
    open_streams: Arc<AtomicUsize>,
    closed: bool,
}

impl MockEventFeed {
    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.journal
                .lock()
                .unwrap()
                .push(format!("closed:{}", self.build_id));
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl FeedStream for MockEventFeed {
    type Item = BuildEvent;

    async fn next_item(&mut self) -> FeedItem<BuildEvent> {
        match self.items.pop_front() {
            Some(FeedItem::End(outcome)) => {
                if !self.closed && !self.hold_open.is_zero() {
                    sleep(self.hold_open).await;
                }
                self.mark_closed();
                FeedItem::End(outcome)
            }
            Some(item) => item,
            None => {
                self.mark_closed();
                FeedItem::End(StreamOutcome::Completed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::event_types;
    use serde_json::Value;

    #[tokio::test]
    async fn scripted_feed_yields_events_then_outcome() {
        let script = ScriptedBuild::new("b1").with_events(vec![
            BuildEvent::new(event_types::BUILD_STARTED, 100, Value::Null),
            BuildEvent::new(event_types::BUILD_FINISHED, 150, Value::Null),
        ]);
        let client = MockExportClient::new(vec![script]);
        let filter = EventTypeFilter::new(["BuildStarted", "BuildFinished"]);

        let mut feed = client
            .open_event_feed(&BuildId::new("b1"), &filter)
            .await
            .unwrap();

        assert!(matches!(feed.next_item().await, FeedItem::Item(e) if e.event_type == "BuildStarted"));
        assert!(matches!(feed.next_item().await, FeedItem::Item(e) if e.event_type == "BuildFinished"));
        assert!(matches!(
            feed.next_item().await,
            FeedItem::End(StreamOutcome::Completed)
        ));
        assert_eq!(client.journal(), vec!["open:b1", "closed:b1"]);
    }

    #[tokio::test]
    async fn event_feed_applies_filter() {
        let script = ScriptedBuild::new("b1").with_events(vec![
            BuildEvent::new(event_types::TASK_FINISHED, 1, Value::Null),
            BuildEvent::new(event_types::BUILD_FINISHED, 2, Value::Null),
        ]);
        let client = MockExportClient::new(vec![script]);
        let filter = EventTypeFilter::new(["TaskFinished"]);

        let mut feed = client
            .open_event_feed(&BuildId::new("b1"), &filter)
            .await
            .unwrap();

        assert!(matches!(feed.next_item().await, FeedItem::Item(e) if e.event_type == "TaskFinished"));
        assert!(matches!(feed.next_item().await, FeedItem::End(_)));
        assert_eq!(client.filters_seen(), vec![vec!["TaskFinished".to_string()]]);
    }

    #[tokio::test]
    async fn announcement_feed_yields_builds_in_order() {
        let client =
            MockExportClient::new(vec![ScriptedBuild::new("b1"), ScriptedBuild::new("b2")]);

        let mut feed = client.open_build_feed(StartMarker::Now).await.unwrap();
        assert!(matches!(feed.next_item().await, FeedItem::Item(b) if b.build_id == "b1"));
        assert!(matches!(feed.next_item().await, FeedItem::Item(b) if b.build_id == "b2"));
        assert!(matches!(feed.next_item().await, FeedItem::End(_)));
    }

    #[tokio::test]
    async fn injectable_open_failure() {
        let config = MockFeedConfig {
            fail_event_feed: vec![BuildId::new("b1")],
            ..Default::default()
        };
        let client = MockExportClient::with_config(vec![ScriptedBuild::new("b1")], config);
        let filter = EventTypeFilter::new(["BuildStarted"]);

        let result = client.open_event_feed(&BuildId::new("b1"), &filter).await;
        assert!(result.is_err());
        assert_eq!(client.journal(), vec!["refused:b1"]);
    }
}
