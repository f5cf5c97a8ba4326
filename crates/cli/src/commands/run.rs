//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::{parse_start_marker, RunArgs};
use crate::pipeline::{Pipeline, PipelineConfig};
use contracts::ExportBlueprint;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref url) = args.server_url {
        info!(server_url = %url, "Overriding server URL from CLI");
        blueprint.server.base_url = url.clone();
    }
    if let Some(ref since) = args.since {
        let marker = parse_start_marker(since)?;
        info!(since = %marker, "Overriding start marker from CLI");
        blueprint.subscription.since = marker;
    }
    if let Some(max_concurrent) = args.max_concurrent {
        if max_concurrent == 0 {
            anyhow::bail!("--max-concurrent must be > 0");
        }
        info!(max_concurrent, "Overriding concurrency ceiling from CLI");
        blueprint.scheduler.max_concurrent = max_concurrent;
    }

    info!(
        server = %blueprint.server.base_url,
        since = %blueprint.subscription.since,
        max_concurrent = blueprint.scheduler.max_concurrent,
        handlers = blueprint.handlers.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        max_builds: if args.max_builds == 0 {
            None
        } else {
            Some(args.max_builds)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting subscription...");

    let stats = Pipeline::new(pipeline_config)
        .run()
        .await
        .context("Pipeline execution failed")?;

    info!(
        builds_completed = stats.builds_completed,
        builds_failed = stats.builds_failed,
        events_delivered = stats.events_delivered,
        duration_secs = stats.duration.as_secs_f64(),
        "Subscription ended"
    );

    // Print detailed statistics
    stats.print_summary();

    Ok(())
}

/// Print a human-readable configuration overview
fn print_config_summary(blueprint: &ExportBlueprint) {
    println!("\nConfiguration summary:");
    println!("  Server: {}", blueprint.server.base_url);
    println!("  Since: {}", blueprint.subscription.since);
    println!("  Max concurrent: {}", blueprint.scheduler.max_concurrent);
    match blueprint.scheduler.queue_capacity {
        Some(capacity) => println!(
            "  Queue: bounded ({capacity}, {:?})",
            blueprint.scheduler.overflow_policy
        ),
        None => println!("  Queue: unbounded"),
    }
    println!("  Handlers:");
    for handler in &blueprint.handlers {
        println!("    - {} ({:?})", handler.id, handler.kind);
    }
}
