//! # Ingestion
//!
//! Export feed ingestion module.
//!
//! Responsibilities:
//! - Talk to the export server over SSE (`reqwest-eventsource`)
//! - Parse announcement and event payloads into contract types
//! - Run the long-lived top-level feed subscription
//! - Provide a scriptable mock client for deterministic tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{BuildFeedSubscriber, SseExportClient};
//! use contracts::StartMarker;
//! use std::sync::Arc;
//!
//! let client = Arc::new(SseExportClient::new("https://develocity.example.com")?);
//! let subscriber = BuildFeedSubscriber::new(client);
//! let outcome = subscriber.run(StartMarker::Now, announcements_tx).await;
//! ```

mod error;
mod mock;
mod sse;
mod subscriber;

// Re-exports
pub use contracts::{Build, BuildEvent, FeedItem, StreamOutcome};
pub use error::{IngestionError, Result};
pub use mock::{MockBuildFeed, MockEventFeed, MockExportClient, MockFeedConfig, ScriptedBuild};
pub use sse::{SseBuildFeed, SseEventFeed, SseExportClient};
pub use subscriber::BuildFeedSubscriber;
