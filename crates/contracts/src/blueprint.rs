//! ExportBlueprint - Config Loader output
//!
//! Describes a complete subscription: server endpoint, start marker,
//! admission limits, and the handler variants to register.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::StartMarker;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete subscription blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Export server settings
    pub server: ServerConfig,

    /// Top-level feed subscription settings
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Admission scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Handler variants to register
    pub handlers: Vec<HandlerConfig>,
}

/// Export server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the export server (e.g. "https://develocity.example.com")
    pub base_url: String,
}

/// Top-level feed subscription settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Start marker: "now" or an epoch-millisecond instant
    #[serde(default)]
    pub since: StartMarker,
}

/// Admission scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrency ceiling: builds processed simultaneously, must be > 0
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Pending queue bound (None = unbounded, the source behavior)
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// What to do with an announcement when the bounded queue is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_capacity: None,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

/// Overflow policy for a bounded pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming announcement
    #[default]
    DropNewest,
    /// Evict the oldest pending announcement
    DropOldest,
}

/// Handler variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Handler name (unique, used for logging)
    pub id: String,

    /// Variant kind
    pub kind: HandlerKind,

    /// Kind-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Builtin handler variant kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Wall-clock duration from BuildStarted to BuildFinished
    BuildDuration,
    /// Count of cacheable tasks, reported at stream end
    CacheableTaskCount,
    /// Log every subscribed event (diagnostic)
    EventLog,
}
