//! poiframe Common Utilities
//!
//! Shared infrastructure for all poiframe crates:
//! - Error taxonomy and result aliases
//! - Timestamp parsing/formatting and the per-run batch clock
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
