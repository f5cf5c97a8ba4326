//! # Dispatcher
//!
//! Admission and dispatch module.
//!
//! Responsibilities:
//! - Enforce the concurrency ceiling over simultaneously processed builds
//! - Keep strict FIFO admission over announced builds
//! - Run one stream processor per admitted build until terminal state
//! - Release every concurrency slot exactly once, on every exit path

pub mod metrics;
pub mod processor;
pub mod scheduler;

pub use metrics::{SchedulerMetrics, SchedulerSnapshot};
pub use processor::{BuildCompletion, BuildStreamProcessor};
pub use scheduler::AdmissionScheduler;
