//! # Handler Factory
//!
//! Handler capability and instantiation module.
//!
//! Responsibilities:
//! - Discover declared capabilities of configured handler variants
//! - Compute the event-type filter for per-build feed requests
//! - Build one dispatch table per admitted build
//! - Provide the builtin handler variants

pub mod error;
pub mod factory;
pub mod handlers;
pub mod registry;
pub mod table;

pub use contracts::{EventHandler, HandlerCapability, HandlerVariant};
pub use error::{HandlerFactoryError, Result};
pub use factory::{variants_from_config, HandlerFactory};
pub use handlers::{BuildDurationVariant, CacheableTaskCountVariant, EventLogVariant};
pub use registry::CapabilityRegistry;
pub use table::DispatchTable;
