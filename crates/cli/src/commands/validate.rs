//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use handler_factory::{variants_from_config, CapabilityRegistry};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    server_url: String,
    since: String,
    max_concurrent: usize,
    handler_count: usize,
    event_types: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => {
            return ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    // Building the variants validates handler parameters too
    let variants = match variants_from_config(&blueprint.handlers) {
        Ok(variants) => variants,
        Err(e) => {
            return ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    let registry = CapabilityRegistry::new(variants);
    let warnings = collect_warnings(&blueprint);

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            server_url: blueprint.server.base_url.clone(),
            since: blueprint.subscription.since.to_string(),
            max_concurrent: blueprint.scheduler.max_concurrent,
            handler_count: blueprint.handlers.len(),
            event_types: registry.event_type_filter().types().to_vec(),
        }),
    }
}

fn collect_warnings(blueprint: &contracts::ExportBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.scheduler.queue_capacity.is_none() {
        warnings.push(
            "scheduler.queue_capacity not set: the pending queue is unbounded and can grow \
             without limit under sustained announcement bursts"
                .to_string(),
        );
    }

    if blueprint.scheduler.max_concurrent > 64 {
        warnings.push(format!(
            "scheduler.max_concurrent = {} opens that many simultaneous server connections",
            blueprint.scheduler.max_concurrent
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);
        if let Some(summary) = &result.summary {
            println!("  Server: {}", summary.server_url);
            println!("  Since: {}", summary.since);
            println!("  Max concurrent: {}", summary.max_concurrent);
            println!("  Handlers: {}", summary.handler_count);
            println!("  Event types: {}", summary.event_types.join(", "));
        }
        if let Some(warnings) = &result.warnings {
            println!("\nWarnings:");
            for warning in warnings {
                println!("  ! {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(error) = &result.error {
            println!("  Error: {}", error);
        }
    }
}
