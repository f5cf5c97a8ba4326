//! HandlerFactory core implementation
//!
//! Instantiates handlers per (build, variant) pair and assembles the
//! per-build dispatch table.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{Build, HandlerConfig, HandlerKind, HandlerVariant};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::handlers::{BuildDurationVariant, CacheableTaskCountVariant, EventLogVariant};
use crate::table::{BoundHandler, DispatchTable};

/// Handler Factory
///
/// Holds the configured variants and builds one [`DispatchTable`] per
/// admitted build. Instance construction happens once per call; instances
/// are never memoized or reused across builds.
pub struct HandlerFactory {
    variants: Vec<Arc<dyn HandlerVariant>>,
}

impl HandlerFactory {
    /// Create a factory over the given variants (declaration order is kept)
    pub fn new(variants: Vec<Arc<dyn HandlerVariant>>) -> Self {
        Self { variants }
    }

    /// Number of registered variants
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Build the dispatch table for one build.
    ///
    /// For each variant, in declaration order: construct one instance bound
    /// to `build`, subscribe it to every event type the variant declares,
    /// and append it to the completion list when the variant wants one.
    #[instrument(
        name = "factory_create_dispatch_table",
        skip(self, build),
        fields(build_id = %build.build_id, variants = self.variants.len())
    )]
    pub fn create_dispatch_table(&self, build: &Build) -> DispatchTable {
        let mut instances = Vec::with_capacity(self.variants.len());
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        let mut completion = Vec::new();

        for variant in &self.variants {
            let idx = instances.len();
            instances.push(BoundHandler {
                variant: variant.name().to_string(),
                handler: variant.instantiate(build),
            });

            for event_type in variant.subscribed_types() {
                by_type.entry(event_type.clone()).or_default().push(idx);
            }
            if variant.wants_completion() {
                completion.push(idx);
            }
        }

        debug!(
            build_id = %build.build_id,
            handlers = instances.len(),
            event_types = by_type.len(),
            completion_hooks = completion.len(),
            "dispatch table assembled"
        );

        DispatchTable::new(build.build_id.clone(), instances, by_type, completion)
    }
}

/// Construct the variant list declared by a blueprint's handler section.
pub fn variants_from_config(configs: &[HandlerConfig]) -> Result<Vec<Arc<dyn HandlerVariant>>> {
    configs.iter().map(create_variant).collect()
}

/// Create one variant from configuration
fn create_variant(config: &HandlerConfig) -> Result<Arc<dyn HandlerVariant>> {
    match config.kind {
        HandlerKind::BuildDuration => Ok(Arc::new(BuildDurationVariant::new(&config.id))),
        HandlerKind::CacheableTaskCount => {
            Ok(Arc::new(CacheableTaskCountVariant::new(&config.id)))
        }
        HandlerKind::EventLog => Ok(Arc::new(EventLogVariant::from_params(
            &config.id,
            &config.params,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BuildEvent, ContractError, EventHandler};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Variant that counts how many instances it has produced
    struct InstanceCountingVariant {
        name: String,
        types: Vec<String>,
        instantiations: Arc<AtomicU64>,
    }

    struct NopHandler;

    impl EventHandler for NopHandler {
        fn on_event(&mut self, _event: &BuildEvent) -> std::result::Result<(), ContractError> {
            Ok(())
        }
    }

    impl HandlerVariant for InstanceCountingVariant {
        fn name(&self) -> &str {
            &self.name
        }

        fn subscribed_types(&self) -> &[String] {
            &self.types
        }

        fn instantiate(&self, _build: &Build) -> Box<dyn EventHandler> {
            self.instantiations.fetch_add(1, Ordering::Relaxed);
            Box::new(NopHandler)
        }
    }

    #[test]
    fn one_instance_per_variant_per_build() {
        let instantiations = Arc::new(AtomicU64::new(0));
        let factory = HandlerFactory::new(vec![Arc::new(InstanceCountingVariant {
            name: "probe".into(),
            types: vec!["BuildStarted".into()],
            instantiations: Arc::clone(&instantiations),
        })]);

        let b1 = Build::with_id("b1");
        let b2 = Build::with_id("b2");

        let t1 = factory.create_dispatch_table(&b1);
        let t2 = factory.create_dispatch_table(&b2);

        assert_eq!(instantiations.load(Ordering::Relaxed), 2);
        assert_eq!(t1.handler_count(), 1);
        assert_eq!(t2.handler_count(), 1);
        assert_eq!(t1.build_id(), &b1.build_id);
    }

    #[test]
    fn variants_from_config_rejects_bad_params() {
        use contracts::HandlerConfig;
        use std::collections::HashMap;

        let mut params = HashMap::new();
        params.insert("event_types".to_string(), "  ,  ".to_string());
        let configs = vec![HandlerConfig {
            id: "log".into(),
            kind: HandlerKind::EventLog,
            params,
        }];

        assert!(variants_from_config(&configs).is_err());
    }

    #[test]
    fn variants_from_config_builds_builtins() {
        use contracts::HandlerConfig;
        use std::collections::HashMap;

        let configs = vec![
            HandlerConfig {
                id: "duration".into(),
                kind: HandlerKind::BuildDuration,
                params: HashMap::new(),
            },
            HandlerConfig {
                id: "cache".into(),
                kind: HandlerKind::CacheableTaskCount,
                params: HashMap::new(),
            },
        ];

        let variants = variants_from_config(&configs).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].name(), "duration");
        assert!(variants[1].wants_completion());
    }
}
