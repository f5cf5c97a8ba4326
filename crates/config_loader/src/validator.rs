//! Configuration validation module
//!
//! Validation rules:
//! - base_url non-empty, http(s) scheme
//! - max_concurrent > 0
//! - queue_capacity, when set, > 0
//! - at least one handler configured
//! - handler ids unique

use std::collections::HashSet;

use contracts::{ContractError, ExportBlueprint};

/// Validate an ExportBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ExportBlueprint) -> Result<(), ContractError> {
    validate_server(blueprint)?;
    validate_scheduler(blueprint)?;
    validate_handlers(blueprint)?;
    Ok(())
}

/// Validate server settings
fn validate_server(blueprint: &ExportBlueprint) -> Result<(), ContractError> {
    let url = blueprint.server.base_url.trim();
    if url.is_empty() {
        return Err(ContractError::config_validation(
            "server.base_url",
            "must not be empty",
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ContractError::config_validation(
            "server.base_url",
            format!("expected http(s) URL, got '{url}'"),
        ));
    }
    Ok(())
}

/// Validate admission limits
fn validate_scheduler(blueprint: &ExportBlueprint) -> Result<(), ContractError> {
    let scheduler = &blueprint.scheduler;

    if scheduler.max_concurrent == 0 {
        return Err(ContractError::config_validation(
            "scheduler.max_concurrent",
            "must be > 0",
        ));
    }

    if let Some(capacity) = scheduler.queue_capacity {
        if capacity == 0 {
            return Err(ContractError::config_validation(
                "scheduler.queue_capacity",
                "must be > 0 when set (omit for an unbounded queue)",
            ));
        }
    }

    Ok(())
}

/// Validate handler list: non-empty, unique ids
fn validate_handlers(blueprint: &ExportBlueprint) -> Result<(), ContractError> {
    if blueprint.handlers.is_empty() {
        return Err(ContractError::config_validation(
            "handlers",
            "at least one handler must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for handler in &blueprint.handlers {
        if handler.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                "handlers[].id",
                "must not be empty",
            ));
        }
        if !seen.insert(&handler.id) {
            return Err(ContractError::config_validation(
                format!("handlers[id={}]", handler.id),
                "duplicate handler id",
            ));
        }
    }
    Ok(())
}
