//! Build announcements and build events
//!
//! Wire shapes for the two feed levels of the export protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{BuildId, ContractError};

/// Well-known event type names emitted by the export server.
///
/// Handlers are free to subscribe to types outside this list; these constants
/// only exist so builtin handlers and tests do not repeat string literals.
pub mod event_types {
    pub const BUILD_STARTED: &str = "BuildStarted";
    pub const BUILD_FINISHED: &str = "BuildFinished";
    pub const TASK_STARTED: &str = "TaskStarted";
    pub const TASK_FINISHED: &str = "TaskFinished";
}

/// A build announcement from the top-level feed.
///
/// Immutable once parsed; the per-build event feed is keyed by `build_id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// Opaque build identifier
    pub build_id: BuildId,

    /// Version of the tool that produced the build (optional announcement field)
    #[serde(default)]
    pub tool_version: Option<String>,

    /// Announcement timestamp in epoch milliseconds (optional)
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Build {
    /// Create a bare announcement with only an id (tests and mocks)
    pub fn with_id(build_id: impl Into<BuildId>) -> Self {
        Self {
            build_id: build_id.into(),
            tool_version: None,
            timestamp: None,
        }
    }
}

/// A single typed event on a build's timeline.
///
/// Wire shape is nested: `{ "type": { "eventType": "<name>" }, "timestamp": <i64>,
/// "data": {...} }`. The nesting is flattened at parse time; handler code only
/// ever sees `event_type` / `timestamp` / `data`.
#[derive(Debug, Clone)]
pub struct BuildEvent {
    /// Event type name, e.g. "BuildStarted"
    pub event_type: String,

    /// Event timestamp in epoch milliseconds
    pub timestamp: i64,

    /// Type-specific payload; `Null` when the server sends none
    pub data: serde_json::Value,
}

impl BuildEvent {
    /// Construct an event directly (tests and mocks)
    pub fn new(event_type: impl Into<String>, timestamp: i64, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            data,
        }
    }
}

#[derive(Deserialize)]
struct WireEventType {
    #[serde(rename = "eventType")]
    event_type: String,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: WireEventType,
    timestamp: i64,
    #[serde(default)]
    data: serde_json::Value,
}

impl<'de> Deserialize<'de> for BuildEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEvent::deserialize(deserializer)?;
        Ok(Self {
            event_type: wire.event_type.event_type,
            timestamp: wire.timestamp,
            data: wire.data,
        })
    }
}

/// Start marker for the top-level announcement feed.
///
/// Either the literal "now" or an absolute instant in epoch milliseconds.
/// Rendered verbatim into the feed URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMarker {
    /// Subscribe from the moment the connection is established
    #[default]
    Now,

    /// Subscribe from an absolute instant (epoch milliseconds)
    Millis(i64),
}

impl fmt::Display for StartMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => f.write_str("now"),
            Self::Millis(ms) => write!(f, "{ms}"),
        }
    }
}

impl FromStr for StartMarker {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("now") {
            return Ok(Self::Now);
        }
        s.parse::<i64>().map(Self::Millis).map_err(|_| {
            ContractError::config_validation(
                "since",
                format!("expected 'now' or epoch milliseconds, got '{s}'"),
            )
        })
    }
}

impl Serialize for StartMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Now => serializer.serialize_str("now"),
            Self::Millis(ms) => serializer.serialize_i64(*ms),
        }
    }
}

impl<'de> Deserialize<'de> for StartMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MarkerVisitor;

        impl serde::de::Visitor<'_> for MarkerVisitor {
            type Value = StartMarker;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"now\" or an epoch-millisecond integer")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(|e: ContractError| E::custom(e))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(StartMarker::Millis(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(StartMarker::Millis(v as i64))
            }
        }

        deserializer.deserialize_any(MarkerVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_announcement_with_extras() {
        let json = r#"{"buildId":"htkxyg2wfyanw","toolVersion":"8.4","timestamp":1700000000000}"#;
        let build: Build = serde_json::from_str(json).unwrap();
        assert_eq!(build.build_id, "htkxyg2wfyanw");
        assert_eq!(build.tool_version.as_deref(), Some("8.4"));
        assert_eq!(build.timestamp, Some(1700000000000));
    }

    #[test]
    fn parse_announcement_minimal() {
        let build: Build = serde_json::from_str(r#"{"buildId":"b1"}"#).unwrap();
        assert_eq!(build.build_id, "b1");
        assert!(build.tool_version.is_none());
    }

    #[test]
    fn parse_event_nested_type() {
        let json = r#"{"type":{"eventType":"TaskFinished"},"timestamp":150,"data":{"cacheable":true}}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "TaskFinished");
        assert_eq!(event.timestamp, 150);
        assert_eq!(event.data["cacheable"], serde_json::json!(true));
    }

    #[test]
    fn parse_event_without_data() {
        let json = r#"{"type":{"eventType":"BuildStarted"},"timestamp":100}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "BuildStarted");
        assert!(event.data.is_null());
    }

    #[test]
    fn start_marker_display_and_parse() {
        assert_eq!(StartMarker::Now.to_string(), "now");
        assert_eq!(StartMarker::Millis(1700000000000).to_string(), "1700000000000");
        assert_eq!("now".parse::<StartMarker>().unwrap(), StartMarker::Now);
        assert_eq!(
            "1700000000000".parse::<StartMarker>().unwrap(),
            StartMarker::Millis(1700000000000)
        );
        assert!("yesterday".parse::<StartMarker>().is_err());
    }

    #[test]
    fn start_marker_serde() {
        assert_eq!(serde_json::to_string(&StartMarker::Now).unwrap(), "\"now\"");
        let marker: StartMarker = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(marker, StartMarker::Millis(1700000000000));
        let marker: StartMarker = serde_json::from_str("\"now\"").unwrap();
        assert_eq!(marker, StartMarker::Now);
    }
}
