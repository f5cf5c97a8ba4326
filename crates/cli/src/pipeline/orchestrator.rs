//! Pipeline orchestrator - coordinates all components.
//!
//! Wires the feed subscriber, the admission scheduler, and the handler
//! factory together, then supervises the run until the feed ends, the build
//! limit or timeout is reached, or a shutdown signal arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use contracts::{ExportBlueprint, ExportClient, StreamOutcome};
use dispatcher::AdmissionScheduler;
use handler_factory::{variants_from_config, CapabilityRegistry, HandlerFactory};
use ingestion::{BuildFeedSubscriber, SseExportClient};

use super::PipelineStats;

/// How long to wait for in-flight streams after the subscription ends
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The subscription blueprint
    pub blueprint: ExportBlueprint,

    /// Maximum builds to process (None = unlimited)
    pub max_builds: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline against the real export server
    pub async fn run(self) -> Result<PipelineStats> {
        let client = SseExportClient::new(&self.config.blueprint.server.base_url)
            .context("Failed to create export client")?;
        self.run_with_client(Arc::new(client)).await
    }

    /// Run the pipeline against any export client (used by tests and demos)
    pub async fn run_with_client<C>(self, client: Arc<C>) -> Result<PipelineStats>
    where
        C: ExportClient + Send + Sync + 'static,
        C::BuildFeed: 'static,
        C::EventFeed: 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Assemble handler capabilities
        let variants = variants_from_config(&blueprint.handlers)
            .context("Failed to build handler variants")?;
        let registry = CapabilityRegistry::new(variants.clone());
        let filter = registry.event_type_filter();

        info!(
            handlers = registry.variant_count(),
            event_types = ?filter.types(),
            "Handler capabilities assembled"
        );

        let factory = Arc::new(HandlerFactory::new(variants));

        // Start the admission scheduler
        let (scheduler, announcements) = AdmissionScheduler::new(
            blueprint.scheduler.clone(),
            Arc::clone(&client),
            factory,
            filter,
        );
        let scheduler = scheduler.with_max_builds(self.config.max_builds);
        let metrics = scheduler.metrics();
        let summary = scheduler.summary();
        let scheduler_task = tokio::spawn(scheduler.run());

        // Run the announcement subscription
        let subscriber = BuildFeedSubscriber::new(client);
        let since = blueprint.subscription.since;

        info!(since = %since, "Starting announcement subscription");

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            outcome = subscriber.run(since, announcements) => {
                match outcome {
                    StreamOutcome::Completed => info!("Announcement subscription ended"),
                    StreamOutcome::Failed { reason } => {
                        warn!(reason = %reason, "Announcement subscription failed")
                    }
                }
            }
            _ = deadline => {
                warn!(timeout_secs = ?timeout.map(|t| t.as_secs()), "Run timeout reached, shutting down");
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, draining in-flight builds");
            }
        }

        // Dropping the subscriber arm dropped the announcement sender, so the
        // scheduler drains its in-flight streams and stops on its own.
        if tokio::time::timeout(DRAIN_TIMEOUT, scheduler_task)
            .await
            .is_err()
        {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "Scheduler did not drain in time, abandoning in-flight builds"
            );
        }

        let snapshot = metrics.snapshot();
        let feed_summary = summary.lock().unwrap().summary();

        let stats = PipelineStats::from_parts(snapshot, feed_summary, start_time.elapsed());

        info!(
            builds_completed = stats.builds_completed,
            builds_failed = stats.builds_failed,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Wait for ctrl-c; never resolves if the signal handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
