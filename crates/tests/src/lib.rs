//! # Integration Tests
//!
//! End-to-end tests against the mock export client.
//!
//! Covers:
//! - Admission invariants (FIFO order, concurrency ceiling)
//! - Exact per-variant event delivery and completion semantics
//! - The event-type filter sent on per-build feed requests

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        // Contracts crate stays usable standalone
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        event_types, Build, BuildEvent, ContractError, EventHandler, HandlerVariant,
        SchedulerConfig, StartMarker,
    };
    use dispatcher::{AdmissionScheduler, SchedulerMetrics};
    use handler_factory::{CapabilityRegistry, HandlerFactory};
    use ingestion::{BuildFeedSubscriber, MockExportClient, ScriptedBuild};
    use serde_json::{json, Value};

    /// Test variant recording deliveries and completions into a shared log.
    ///
    /// Log entries: "<variant>/<build>:<event_type>@<ts>" and
    /// "<variant>/<build>:complete".
    struct RecordingVariant {
        name: String,
        types: Vec<String>,
        wants_completion: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingVariant {
        fn arc(
            name: &str,
            types: &[&str],
            wants_completion: bool,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<dyn HandlerVariant> {
            Arc::new(Self {
                name: name.to_string(),
                types: types.iter().map(|t| t.to_string()).collect(),
                wants_completion,
                log: Arc::clone(log),
            })
        }
    }

    struct RecordingHandler {
        tag: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl HandlerVariant for RecordingVariant {
        fn name(&self) -> &str {
            &self.name
        }

        fn subscribed_types(&self) -> &[String] {
            &self.types
        }

        fn wants_completion(&self) -> bool {
            self.wants_completion
        }

        fn instantiate(&self, build: &Build) -> Box<dyn EventHandler> {
            Box::new(RecordingHandler {
                tag: format!("{}/{}", self.name, build.build_id),
                log: Arc::clone(&self.log),
            })
        }
    }

    impl EventHandler for RecordingHandler {
        fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
            self.log.lock().unwrap().push(format!(
                "{}:{}@{}",
                self.tag, event.event_type, event.timestamp
            ));
            Ok(())
        }

        fn complete(&mut self) -> Result<(), ContractError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:complete", self.tag));
            Ok(())
        }
    }

    /// Wire subscriber -> scheduler -> processors against a mock client and
    /// run the whole pipeline to completion.
    async fn run_pipeline(
        client: Arc<MockExportClient>,
        variants: Vec<Arc<dyn HandlerVariant>>,
        max_concurrent: usize,
    ) -> Arc<SchedulerMetrics> {
        let registry = CapabilityRegistry::new(variants.clone());
        let filter = registry.event_type_filter();
        let factory = Arc::new(HandlerFactory::new(variants));
        let config = SchedulerConfig {
            max_concurrent,
            queue_capacity: None,
            overflow_policy: Default::default(),
        };

        let (scheduler, announcements) =
            AdmissionScheduler::new(config, Arc::clone(&client), factory, filter);
        let metrics = scheduler.metrics();
        let scheduler_task = tokio::spawn(scheduler.run());

        let outcome = BuildFeedSubscriber::new(client)
            .run(StartMarker::Now, announcements)
            .await;
        assert!(outcome.is_completed());

        scheduler_task.await.unwrap();
        metrics
    }

    /// maxConcurrent=1: B2 must not begin until B1's stream closed
    #[tokio::test]
    async fn test_single_slot_is_sequential_fifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![RecordingVariant::arc(
            "probe",
            &[event_types::BUILD_STARTED],
            false,
            &log,
        )];

        let scripts = vec![
            ScriptedBuild::new("b1")
                .with_events(vec![BuildEvent::new(
                    event_types::BUILD_STARTED,
                    1,
                    Value::Null,
                )])
                .hold_open(Duration::from_millis(25)),
            ScriptedBuild::new("b2").with_events(vec![BuildEvent::new(
                event_types::BUILD_STARTED,
                2,
                Value::Null,
            )]),
        ];
        let client = Arc::new(MockExportClient::new(scripts));

        let metrics = run_pipeline(Arc::clone(&client), variants, 1).await;

        assert_eq!(
            client.journal(),
            vec!["open:b1", "closed:b1", "open:b2", "closed:b2"]
        );
        assert_eq!(client.peak_open_streams(), 1);
        assert_eq!(metrics.builds_completed(), 2);
    }

    /// The number of simultaneously open streams never exceeds the ceiling
    #[tokio::test]
    async fn test_concurrency_ceiling_holds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![RecordingVariant::arc(
            "probe",
            &[event_types::BUILD_STARTED],
            false,
            &log,
        )];

        let scripts = (1..=6)
            .map(|i| {
                ScriptedBuild::new(&format!("b{i}")).hold_open(Duration::from_millis(15))
            })
            .collect();
        let client = Arc::new(MockExportClient::new(scripts));

        let metrics = run_pipeline(Arc::clone(&client), variants, 2).await;

        assert!(client.peak_open_streams() <= 2);
        assert_eq!(metrics.builds_admitted(), 6);
        assert_eq!(metrics.builds_completed(), 6);
    }

    /// BuildStarted@100 then BuildFinished@150 yields a duration of 50
    #[tokio::test]
    async fn test_duration_scenario() {
        struct DurationProbeVariant {
            types: Vec<String>,
            result: Arc<Mutex<Option<i64>>>,
        }

        struct DurationProbe {
            started_at: Option<i64>,
            result: Arc<Mutex<Option<i64>>>,
        }

        impl HandlerVariant for DurationProbeVariant {
            fn name(&self) -> &str {
                "duration_probe"
            }

            fn subscribed_types(&self) -> &[String] {
                &self.types
            }

            fn instantiate(&self, _build: &Build) -> Box<dyn EventHandler> {
                Box::new(DurationProbe {
                    started_at: None,
                    result: Arc::clone(&self.result),
                })
            }
        }

        impl EventHandler for DurationProbe {
            fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
                match event.event_type.as_str() {
                    event_types::BUILD_STARTED => self.started_at = Some(event.timestamp),
                    event_types::BUILD_FINISHED => {
                        if let Some(started) = self.started_at {
                            *self.result.lock().unwrap() = Some(event.timestamp - started);
                        }
                    }
                    _ => {}
                }
                Ok(())
            }
        }

        let result = Arc::new(Mutex::new(None));
        let variants: Vec<Arc<dyn HandlerVariant>> = vec![Arc::new(DurationProbeVariant {
            types: vec![
                event_types::BUILD_STARTED.to_string(),
                event_types::BUILD_FINISHED.to_string(),
            ],
            result: Arc::clone(&result),
        })];

        let scripts = vec![ScriptedBuild::new("b1").with_events(vec![
            BuildEvent::new(event_types::BUILD_STARTED, 100, Value::Null),
            BuildEvent::new(event_types::BUILD_FINISHED, 150, Value::Null),
        ])];
        let client = Arc::new(MockExportClient::new(scripts));

        run_pipeline(client, variants, 1).await;

        assert_eq!(*result.lock().unwrap(), Some(50));
    }

    /// Three TaskFinished events with cacheable true/false/true count to 2,
    /// reported through the completion hook
    #[tokio::test]
    async fn test_cacheable_count_scenario() {
        struct CacheProbeVariant {
            types: Vec<String>,
            result: Arc<Mutex<Option<u64>>>,
        }

        struct CacheProbe {
            cacheable: u64,
            result: Arc<Mutex<Option<u64>>>,
        }

        impl HandlerVariant for CacheProbeVariant {
            fn name(&self) -> &str {
                "cache_probe"
            }

            fn subscribed_types(&self) -> &[String] {
                &self.types
            }

            fn wants_completion(&self) -> bool {
                true
            }

            fn instantiate(&self, _build: &Build) -> Box<dyn EventHandler> {
                Box::new(CacheProbe {
                    cacheable: 0,
                    result: Arc::clone(&self.result),
                })
            }
        }

        impl EventHandler for CacheProbe {
            fn on_event(&mut self, event: &BuildEvent) -> Result<(), ContractError> {
                if event.data["cacheable"].as_bool().unwrap_or(false) {
                    self.cacheable += 1;
                }
                Ok(())
            }

            fn complete(&mut self) -> Result<(), ContractError> {
                *self.result.lock().unwrap() = Some(self.cacheable);
                Ok(())
            }
        }

        let result = Arc::new(Mutex::new(None));
        let variants: Vec<Arc<dyn HandlerVariant>> = vec![Arc::new(CacheProbeVariant {
            types: vec![event_types::TASK_FINISHED.to_string()],
            result: Arc::clone(&result),
        })];

        let scripts = vec![ScriptedBuild::new("b1").with_events(vec![
            BuildEvent::new(event_types::TASK_FINISHED, 1, json!({"cacheable": true})),
            BuildEvent::new(event_types::TASK_FINISHED, 2, json!({"cacheable": false})),
            BuildEvent::new(event_types::TASK_FINISHED, 3, json!({"cacheable": true})),
        ])];
        let client = Arc::new(MockExportClient::new(scripts));

        run_pipeline(client, variants, 1).await;

        assert_eq!(*result.lock().unwrap(), Some(2));
    }

    /// Each variant receives exactly its subscribed types, in arrival order,
    /// and the completion hook fires after the last delivered event
    #[tokio::test]
    async fn test_per_variant_delivery_and_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![
            RecordingVariant::arc(
                "lifecycle",
                &[event_types::BUILD_STARTED, event_types::BUILD_FINISHED],
                false,
                &log,
            ),
            RecordingVariant::arc("tasks", &[event_types::TASK_FINISHED], true, &log),
        ];

        let scripts = vec![ScriptedBuild::new("b1").with_events(vec![
            BuildEvent::new(event_types::BUILD_STARTED, 1, Value::Null),
            BuildEvent::new(event_types::TASK_FINISHED, 2, Value::Null),
            BuildEvent::new(event_types::TASK_FINISHED, 3, Value::Null),
            BuildEvent::new(event_types::BUILD_FINISHED, 4, Value::Null),
        ])];
        let client = Arc::new(MockExportClient::new(scripts));

        run_pipeline(client, variants, 1).await;

        let entries = log.lock().unwrap().clone();
        let lifecycle: Vec<&String> = entries
            .iter()
            .filter(|e| e.starts_with("lifecycle/"))
            .collect();
        let tasks: Vec<&String> = entries.iter().filter(|e| e.starts_with("tasks/")).collect();

        assert_eq!(
            lifecycle,
            vec!["lifecycle/b1:BuildStarted@1", "lifecycle/b1:BuildFinished@4"]
        );
        assert_eq!(
            tasks,
            vec![
                "tasks/b1:TaskFinished@2",
                "tasks/b1:TaskFinished@3",
                "tasks/b1:complete"
            ]
        );
        // Completion is the very last entry overall
        assert_eq!(entries.last().unwrap(), "tasks/b1:complete");
    }

    /// Two terminal signals in immediate succession run the completion
    /// sequence exactly once
    #[tokio::test]
    async fn test_duplicate_terminal_signal_closes_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![RecordingVariant::arc(
            "probe",
            &[event_types::TASK_FINISHED],
            true,
            &log,
        )];

        let scripts = vec![ScriptedBuild::new("b1")
            .with_events(vec![BuildEvent::new(
                event_types::TASK_FINISHED,
                1,
                Value::Null,
            )])
            .duplicate_terminal()];
        let client = Arc::new(MockExportClient::new(scripts));

        let metrics = run_pipeline(client, variants, 1).await;

        let entries = log.lock().unwrap();
        let completions = entries.iter().filter(|e| e.ends_with(":complete")).count();
        assert_eq!(completions, 1);
        assert_eq!(metrics.builds_completed(), 1);
    }

    /// The per-build feed request carries the de-duplicated union of all
    /// declared handler event types
    #[tokio::test]
    async fn test_filter_is_union_of_declared_types() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![
            RecordingVariant::arc(
                "lifecycle",
                &[event_types::BUILD_STARTED, event_types::BUILD_FINISHED],
                false,
                &log,
            ),
            // Overlapping declaration: BuildFinished appears twice
            RecordingVariant::arc(
                "overlap",
                &[event_types::BUILD_FINISHED, event_types::TASK_FINISHED],
                false,
                &log,
            ),
        ];

        let scripts = vec![ScriptedBuild::new("b1"), ScriptedBuild::new("b2")];
        let client = Arc::new(MockExportClient::new(scripts));

        run_pipeline(Arc::clone(&client), variants, 2).await;

        let expected = vec![
            "BuildStarted".to_string(),
            "BuildFinished".to_string(),
            "TaskFinished".to_string(),
        ];
        let filters = client.filters_seen();
        assert_eq!(filters.len(), 2);
        for filter in filters {
            assert_eq!(filter, expected);
        }
    }

    /// A blueprint loaded from TOML drives the whole pipeline: configured
    /// handlers determine the filter the mock server receives
    #[tokio::test]
    async fn test_config_file_to_filter() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[server]
base_url = "https://ge.example.com"

[scheduler]
max_concurrent = 1

[[handlers]]
id = "duration"
kind = "build_duration"

[[handlers]]
id = "cache"
kind = "cacheable_task_count"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let variants = handler_factory::variants_from_config(&blueprint.handlers).unwrap();
        let registry = CapabilityRegistry::new(variants.clone());
        let filter = registry.event_type_filter();
        let factory = Arc::new(HandlerFactory::new(variants));

        let client = Arc::new(MockExportClient::new(vec![ScriptedBuild::new("b1")]));
        let (scheduler, announcements) = AdmissionScheduler::new(
            blueprint.scheduler.clone(),
            Arc::clone(&client),
            factory,
            filter,
        );
        let scheduler_task = tokio::spawn(scheduler.run());

        let outcome = BuildFeedSubscriber::new(Arc::clone(&client))
            .run(blueprint.subscription.since, announcements)
            .await;
        assert!(outcome.is_completed());
        scheduler_task.await.unwrap();

        assert_eq!(
            client.filters_seen(),
            vec![vec![
                "BuildStarted".to_string(),
                "BuildFinished".to_string(),
                "TaskFinished".to_string()
            ]]
        );
    }

    /// Empty stream: completion still fires exactly once at stream end
    #[tokio::test]
    async fn test_empty_stream_still_completes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let variants = vec![RecordingVariant::arc(
            "probe",
            &[event_types::TASK_FINISHED],
            true,
            &log,
        )];

        let client = Arc::new(MockExportClient::new(vec![ScriptedBuild::new("b1")]));

        let metrics = run_pipeline(client, variants, 1).await;

        assert_eq!(*log.lock().unwrap(), vec!["probe/b1:complete"]);
        assert_eq!(metrics.builds_completed(), 1);
        assert_eq!(metrics.events_delivered(), 0);
    }
}
