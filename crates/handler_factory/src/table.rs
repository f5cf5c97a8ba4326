//! DispatchTable - per-build event routing
//!
//! Maps event type names to the ordered handler instances subscribed to
//! them. Built once per admitted build, discarded when the build's stream
//! reaches terminal state.

use std::collections::HashMap;

use contracts::{BuildEvent, BuildId, EventHandler};
use tracing::{debug, trace, warn};

/// One handler instance bound to a build, tagged with its variant name
pub(crate) struct BoundHandler {
    pub(crate) variant: String,
    pub(crate) handler: Box<dyn EventHandler>,
}

/// Per-build dispatch table.
///
/// Invariants:
/// - delivery order for one event type == variant declaration order
/// - completion hooks run exactly once, after the last delivered event;
///   a second `complete` call is a no-op
pub struct DispatchTable {
    build_id: BuildId,
    instances: Vec<BoundHandler>,
    by_type: HashMap<String, Vec<usize>>,
    completion: Vec<usize>,
    completed: bool,
}

impl DispatchTable {
    pub(crate) fn new(
        build_id: BuildId,
        instances: Vec<BoundHandler>,
        by_type: HashMap<String, Vec<usize>>,
        completion: Vec<usize>,
    ) -> Self {
        Self {
            build_id,
            instances,
            by_type,
            completion,
            completed: false,
        }
    }

    /// The build this table routes for
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Number of handler instances in the table
    pub fn handler_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of distinct event types with at least one subscriber
    pub fn subscribed_type_count(&self) -> usize {
        self.by_type.len()
    }

    /// Whether the completion sequence has already run
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Route one event to its subscribers, in declaration order.
    ///
    /// Returns the number of instances the event was delivered to; `0` means
    /// the type has no subscriber (tolerated, the event is ignored). A
    /// handler error is logged and does not affect the remaining handlers.
    pub fn dispatch(&mut self, event: &BuildEvent) -> usize {
        let Some(subscribers) = self.by_type.get(&event.event_type) else {
            trace!(
                build_id = %self.build_id,
                event_type = %event.event_type,
                "no subscriber for event type, ignoring"
            );
            return 0;
        };

        let mut delivered = 0;
        for &idx in subscribers {
            let bound = &mut self.instances[idx];
            match bound.handler.on_event(event) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        build_id = %self.build_id,
                        handler = %bound.variant,
                        event_type = %event.event_type,
                        error = %e,
                        "handler failed on event, continuing with remaining handlers"
                    );
                }
            }
        }
        delivered
    }

    /// Run the completion sequence: every completion-declaring instance is
    /// notified once, in declaration order.
    ///
    /// Idempotent: returns `false` without side effects if completion has
    /// already run (the transport may report more than one terminal signal).
    pub fn complete(&mut self) -> bool {
        if self.completed {
            debug!(build_id = %self.build_id, "completion already ran, ignoring");
            return false;
        }
        self.completed = true;

        for &idx in &self.completion {
            let bound = &mut self.instances[idx];
            if let Err(e) = bound.handler.complete() {
                warn!(
                    build_id = %self.build_id,
                    handler = %bound.variant,
                    error = %e,
                    "handler completion hook failed"
                );
            }
        }

        debug!(
            build_id = %self.build_id,
            hooks = self.completion.len(),
            "completion hooks invoked"
        );
        true
    }
}
