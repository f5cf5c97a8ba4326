//! Capability Registry - declared capability discovery
//!
//! Computes, from the configured handler variants, the exact set of event
//! types to request from the per-build feed. The computed filter is used
//! verbatim: no type is requested that no handler wants, no wanted type is
//! omitted.

use std::sync::Arc;

use contracts::{EventTypeFilter, HandlerCapability, HandlerVariant};

/// Registry over the configured handler variants.
///
/// Pure read-side: holds the shared variant list and answers capability
/// questions. No side effects.
#[derive(Clone)]
pub struct CapabilityRegistry {
    variants: Vec<Arc<dyn HandlerVariant>>,
}

impl CapabilityRegistry {
    /// Create a registry over the given variants (declaration order is kept)
    pub fn new(variants: Vec<Arc<dyn HandlerVariant>>) -> Self {
        Self { variants }
    }

    /// Union of all declared event types, de-duplicated, declaration-ordered
    pub fn event_type_filter(&self) -> EventTypeFilter {
        EventTypeFilter::new(
            self.variants
                .iter()
                .flat_map(|v| v.subscribed_types().iter().cloned()),
        )
    }

    /// Declared capability surface of every variant
    pub fn capabilities(&self) -> Vec<HandlerCapability> {
        self.variants
            .iter()
            .map(|v| HandlerCapability::of(v.as_ref()))
            .collect()
    }

    /// Whether any variant wants a completion notification
    pub fn wants_any_completion(&self) -> bool {
        self.variants.iter().any(|v| v.wants_completion())
    }

    /// Number of registered variants
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
