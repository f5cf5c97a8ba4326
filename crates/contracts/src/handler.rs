//! Handler contracts - the pluggable consumer seam
//!
//! Capability discovery is based solely on the declared surface of a variant.
//! There is no hidden registration step and no name-based reflection: a
//! variant states the event types it wants and whether it wants a completion
//! notification, and the registry takes that declaration verbatim.

use serde::Serialize;

use crate::{Build, BuildEvent, ContractError};

/// A handler variant: the capability descriptor shared by all builds.
///
/// Declared once at configuration time. For every admitted build the factory
/// calls [`instantiate`](HandlerVariant::instantiate) exactly once, so
/// accumulator state never leaks across builds.
pub trait HandlerVariant: Send + Sync {
    /// Variant name (used for logging and diagnostics)
    fn name(&self) -> &str;

    /// Event type names this variant reacts to, in declaration order
    fn subscribed_types(&self) -> &[String];

    /// Whether instances want a completion notification at stream end
    fn wants_completion(&self) -> bool {
        false
    }

    /// Construct a fresh handler instance bound to `build`
    fn instantiate(&self, build: &Build) -> Box<dyn EventHandler>;
}

/// A per-build handler instance.
///
/// Receives events in arrival order, strictly sequentially within one build.
/// A returned error is the handler's own fault: the dispatcher logs it and
/// carries on with the remaining handlers of the same build.
pub trait EventHandler: Send {
    /// Deliver one event of a subscribed type
    fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError>;

    /// Stream-end notification, invoked at most once, after the last event
    fn complete(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Capability summary of one variant (for diagnostics output).
#[derive(Debug, Clone, Serialize)]
pub struct HandlerCapability {
    pub name: String,
    pub subscribed_types: Vec<String>,
    pub wants_completion: bool,
}

impl HandlerCapability {
    /// Snapshot the declared surface of a variant
    pub fn of(variant: &dyn HandlerVariant) -> Self {
        Self {
            name: variant.name().to_string(),
            subscribed_types: variant.subscribed_types().to_vec(),
            wants_completion: variant.wants_completion(),
        }
    }
}
