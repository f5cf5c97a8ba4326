//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use handler_factory::{variants_from_config, CapabilityRegistry};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    scheduler: SchedulerInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    handlers: Vec<HandlerInfo>,
    event_type_filter: Vec<String>,
}

#[derive(Serialize)]
struct ServerInfo {
    base_url: String,
    since: String,
}

#[derive(Serialize)]
struct SchedulerInfo {
    max_concurrent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_capacity: Option<usize>,
    overflow_policy: String,
}

#[derive(Serialize)]
struct HandlerInfo {
    id: String,
    kind: String,
    subscribed_types: Vec<String>,
    wants_completion: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let variants = variants_from_config(&blueprint.handlers)
        .context("Failed to build handler variants")?;
    let registry = CapabilityRegistry::new(variants);

    if args.json {
        let info = build_config_info(&blueprint, &registry, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &registry, args);
    }

    Ok(())
}

fn build_config_info(
    blueprint: &contracts::ExportBlueprint,
    registry: &CapabilityRegistry,
    args: &InfoArgs,
) -> ConfigInfo {
    let capabilities = registry.capabilities();

    let handlers = if args.handlers {
        blueprint
            .handlers
            .iter()
            .zip(capabilities.iter())
            .map(|(config, capability)| HandlerInfo {
                id: config.id.clone(),
                kind: format!("{:?}", config.kind),
                subscribed_types: capability.subscribed_types.clone(),
                wants_completion: capability.wants_completion,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        server: ServerInfo {
            base_url: blueprint.server.base_url.clone(),
            since: blueprint.subscription.since.to_string(),
        },
        scheduler: SchedulerInfo {
            max_concurrent: blueprint.scheduler.max_concurrent,
            queue_capacity: blueprint.scheduler.queue_capacity,
            overflow_policy: format!("{:?}", blueprint.scheduler.overflow_policy),
        },
        handlers,
        event_type_filter: registry.event_type_filter().types().to_vec(),
    }
}

fn print_config_info(
    blueprint: &contracts::ExportBlueprint,
    registry: &CapabilityRegistry,
    args: &InfoArgs,
) {
    println!("Configuration: {:?}", blueprint.version);
    println!("\nServer");
    println!("  base_url: {}", blueprint.server.base_url);
    println!("  since: {}", blueprint.subscription.since);

    println!("\nScheduler");
    println!("  max_concurrent: {}", blueprint.scheduler.max_concurrent);
    match blueprint.scheduler.queue_capacity {
        Some(capacity) => {
            println!("  queue_capacity: {}", capacity);
            println!(
                "  overflow_policy: {:?}",
                blueprint.scheduler.overflow_policy
            );
        }
        None => println!("  queue_capacity: unbounded"),
    }

    println!("\nHandlers ({})", blueprint.handlers.len());
    if args.handlers {
        for capability in registry.capabilities() {
            println!(
                "  {} -> [{}]{}",
                capability.name,
                capability.subscribed_types.join(", "),
                if capability.wants_completion {
                    " + completion"
                } else {
                    ""
                }
            );
        }
    } else {
        for handler in &blueprint.handlers {
            println!("  {} ({:?})", handler.id, handler.kind);
        }
    }

    println!(
        "\nEvent type filter: {}",
        registry.event_type_filter().to_query()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn info_reports_filter_union() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[server]
base_url = "https://ge.example.com"

[[handlers]]
id = "duration"
kind = "build_duration"

[[handlers]]
id = "cache"
kind = "cacheable_task_count"
"#,
        )
        .unwrap();

        let blueprint = config_loader::ConfigLoader::load_from_path(file.path()).unwrap();
        let variants = variants_from_config(&blueprint.handlers).unwrap();
        let registry = CapabilityRegistry::new(variants);

        let args = InfoArgs {
            config: file.path().to_path_buf(),
            json: true,
            handlers: true,
        };
        let info = build_config_info(&blueprint, &registry, &args);

        assert_eq!(
            info.event_type_filter,
            vec!["BuildStarted", "BuildFinished", "TaskFinished"]
        );
        assert_eq!(info.handlers.len(), 2);
        assert!(info.handlers[1].wants_completion);
    }
}
