//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are epoch milliseconds (i64), assigned by the export server
//! - Start markers are either the literal "now" or an absolute epoch-millisecond instant

mod blueprint;
mod build;
mod build_id;
mod error;
mod feed;
mod handler;

pub use blueprint::*;
pub use build::*;
pub use build_id::BuildId;
pub use error::*;
pub use feed::*;
pub use handler::*;
