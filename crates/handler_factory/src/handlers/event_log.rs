//! EventLogVariant - logs subscribed events via tracing
//!
//! Diagnostic handler; the subscribed types come from configuration.

use std::collections::HashMap;

use contracts::{event_types, Build, BuildEvent, BuildId, ContractError, EventHandler, HandlerVariant};
use tracing::{debug, info};

use crate::error::HandlerFactoryError;

/// Variant logging every subscribed event
pub struct EventLogVariant {
    name: String,
    types: Vec<String>,
}

impl EventLogVariant {
    /// Create with an explicit subscription list
    pub fn new(name: impl Into<String>, types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            types,
        }
    }

    /// Create from a params map (for the factory).
    ///
    /// Recognized params:
    /// - `event_types`: comma-separated type names
    ///   (default: "BuildStarted,BuildFinished")
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, HandlerFactoryError> {
        let name = name.into();
        let types: Vec<String> = match params.get("event_types") {
            Some(csv) => {
                let types: Vec<String> = csv
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                if types.is_empty() {
                    return Err(HandlerFactoryError::invalid_param(
                        &name,
                        "event_types",
                        format!("no event type names in '{csv}'"),
                    ));
                }
                types
            }
            None => vec![
                event_types::BUILD_STARTED.to_string(),
                event_types::BUILD_FINISHED.to_string(),
            ],
        };

        Ok(Self::new(name, types))
    }
}

impl HandlerVariant for EventLogVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribed_types(&self) -> &[String] {
        &self.types
    }

    fn wants_completion(&self) -> bool {
        true
    }

    fn instantiate(&self, build: &Build) -> Box<dyn EventHandler> {
        Box::new(EventLogHandler {
            variant: self.name.clone(),
            build_id: build.build_id.clone(),
            seen: 0,
        })
    }
}

struct EventLogHandler {
    variant: String,
    build_id: BuildId,
    seen: u64,
}

impl EventHandler for EventLogHandler {
    fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
        self.seen += 1;
        debug!(
            handler = %self.variant,
            build_id = %self.build_id,
            event_type = %event.event_type,
            timestamp = event.timestamp,
            "event received"
        );
        Ok(())
    }

    fn complete(&mut self) -> Result<(), ContractError> {
        info!(
            handler = %self.variant,
            build_id = %self.build_id,
            events = self.seen,
            "event stream ended"
        );
        Ok(())
    }
}
