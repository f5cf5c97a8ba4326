//! BuildDurationVariant - wall-clock duration of a build
//!
//! Subscribes to BuildStarted and BuildFinished; the duration is the delta
//! between the two event timestamps, reported when BuildFinished arrives.

use contracts::{
    event_types, Build, BuildEvent, BuildId, ContractError, EventHandler, HandlerVariant,
};
use tracing::{info, warn};

/// Variant computing build wall-clock duration
pub struct BuildDurationVariant {
    name: String,
    types: Vec<String>,
}

impl BuildDurationVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: vec![
                event_types::BUILD_STARTED.to_string(),
                event_types::BUILD_FINISHED.to_string(),
            ],
        }
    }
}

impl HandlerVariant for BuildDurationVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribed_types(&self) -> &[String] {
        &self.types
    }

    fn instantiate(&self, build: &Build) -> Box<dyn EventHandler> {
        Box::new(BuildDurationHandler {
            variant: self.name.clone(),
            build_id: build.build_id.clone(),
            started_at: None,
            duration_ms: None,
        })
    }
}

/// Per-build accumulator for the duration computation
pub struct BuildDurationHandler {
    variant: String,
    build_id: BuildId,
    started_at: Option<i64>,
    duration_ms: Option<i64>,
}

impl BuildDurationHandler {
    /// Computed duration, available once BuildFinished has been seen
    pub fn duration_ms(&self) -> Option<i64> {
        self.duration_ms
    }
}

impl EventHandler for BuildDurationHandler {
    fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
        match event.event_type.as_str() {
            event_types::BUILD_STARTED => {
                self.started_at = Some(event.timestamp);
            }
            event_types::BUILD_FINISHED => match self.started_at {
                Some(started) => {
                    let duration = event.timestamp - started;
                    self.duration_ms = Some(duration);
                    info!(
                        handler = %self.variant,
                        build_id = %self.build_id,
                        duration_ms = duration,
                        "build duration computed"
                    );
                }
                None => {
                    warn!(
                        handler = %self.variant,
                        build_id = %self.build_id,
                        "BuildFinished without BuildStarted, cannot compute duration"
                    );
                }
            },
            _ => {}
        }
        Ok(())
    }
}
