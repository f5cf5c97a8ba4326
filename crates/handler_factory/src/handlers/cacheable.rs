//! CacheableTaskCountVariant - counts cacheable tasks per build
//!
//! Subscribes to TaskFinished and reports the count at stream end through
//! its completion hook.

use contracts::{
    event_types, Build, BuildEvent, BuildId, ContractError, EventHandler, HandlerVariant,
};
use tracing::info;

/// Variant counting cacheable tasks
pub struct CacheableTaskCountVariant {
    name: String,
    types: Vec<String>,
}

impl CacheableTaskCountVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: vec![event_types::TASK_FINISHED.to_string()],
        }
    }
}

impl HandlerVariant for CacheableTaskCountVariant {
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
        Box::new(CacheableTaskCountHandler {
            variant: self.name.clone(),
            build_id: build.build_id.clone(),
            cacheable: 0,
            total: 0,
        })
    }
}

/// Per-build accumulator for the cacheable-task count
pub struct CacheableTaskCountHandler {
    variant: String,
    build_id: BuildId,
    cacheable: u64,
    total: u64,
}

impl CacheableTaskCountHandler {
    /// Cacheable tasks seen so far
    pub fn cacheable_count(&self) -> u64 {
        self.cacheable
    }

    /// All finished tasks seen so far
    pub fn total_count(&self) -> u64 {
        self.total
    }
}

impl EventHandler for CacheableTaskCountHandler {
    fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
        self.total += 1;
        if event.data["cacheable"].as_bool().unwrap_or(false) {
            self.cacheable += 1;
        }
        Ok(())
    }

    fn complete(&mut self) -> Result<(), ContractError> {
        info!(
            handler = %self.variant,
            build_id = %self.build_id,
            cacheable = self.cacheable,
            total = self.total,
            "cacheable task count"
        );
        Ok(())
    }
}
