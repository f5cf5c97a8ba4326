//! Mock Feed Demo
//!
//! Demonstrates the full dispatch pipeline against the scriptable mock
//! client. Runs without an export server.
//!
//! Run with: cargo run --bin mock_feed

use std::sync::Arc;
use std::time::Duration;

use contracts::{event_types, BuildEvent, SchedulerConfig, StartMarker};
use dispatcher::AdmissionScheduler;
use handler_factory::{
    BuildDurationVariant, CacheableTaskCountVariant, CapabilityRegistry, HandlerFactory,
    HandlerVariant,
};
use ingestion::{BuildFeedSubscriber, MockExportClient, ScriptedBuild};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Feed Demo");

    // ==== Stage 1: Script three builds ====
    let scripts = vec![
        ScriptedBuild::new("demo-build-1").with_events(vec![
            BuildEvent::new(event_types::BUILD_STARTED, 1_000, json!({})),
            BuildEvent::new(event_types::TASK_FINISHED, 1_400, json!({"cacheable": true})),
            BuildEvent::new(event_types::TASK_FINISHED, 1_900, json!({"cacheable": false})),
            BuildEvent::new(event_types::BUILD_FINISHED, 2_500, json!({})),
        ]),
        ScriptedBuild::new("demo-build-2")
            .with_events(vec![
                BuildEvent::new(event_types::BUILD_STARTED, 3_000, json!({})),
                BuildEvent::new(event_types::TASK_FINISHED, 3_600, json!({"cacheable": true})),
                BuildEvent::new(event_types::BUILD_FINISHED, 4_200, json!({})),
            ])
            .hold_open(Duration::from_millis(50)),
        ScriptedBuild::new("demo-build-3").with_events(vec![
            BuildEvent::new(event_types::BUILD_STARTED, 5_000, json!({})),
            BuildEvent::new(event_types::BUILD_FINISHED, 5_100, json!({})),
        ]),
    ];

    let client = Arc::new(MockExportClient::new(scripts));

    // ==== Stage 2: Register handler variants ====
    let variants: Vec<Arc<dyn HandlerVariant>> = vec![
        Arc::new(BuildDurationVariant::new("duration")),
        Arc::new(CacheableTaskCountVariant::new("cache_stats")),
    ];

    let registry = CapabilityRegistry::new(variants.clone());
    let filter = registry.event_type_filter();
    tracing::info!(event_types = ?filter.types(), "Handler capabilities assembled");

    let factory = Arc::new(HandlerFactory::new(variants));

    // ==== Stage 3: Start scheduler (ceiling of 2) ====
    let config = SchedulerConfig {
        max_concurrent: 2,
        queue_capacity: None,
        overflow_policy: Default::default(),
    };
    let (scheduler, announcements) =
        AdmissionScheduler::new(config, Arc::clone(&client), factory, filter);
    let metrics = scheduler.metrics();
    let scheduler_task = tokio::spawn(scheduler.run());

    // ==== Stage 4: Run the announcement subscription ====
    tracing::info!("Running subscription against the mock feed...");
    let outcome = BuildFeedSubscriber::new(Arc::clone(&client))
        .run(StartMarker::Now, announcements)
        .await;
    tracing::info!(outcome = outcome.label(), "Subscription ended");

    scheduler_task.await?;

    // ==== Stage 5: Report ====
    let snapshot = metrics.snapshot();
    tracing::info!(
        builds_completed = snapshot.builds_completed,
        events_delivered = snapshot.events_delivered,
        peak_running = snapshot.peak_running,
        "Demo finished"
    );

    println!("\nFeed journal:");
    for entry in client.journal() {
        println!("  {entry}");
    }

    Ok(())
}
