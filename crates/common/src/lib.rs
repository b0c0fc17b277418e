//! Stride Common Utilities
//!
//! Shared infrastructure for all Stride crates:
//! - Error types and result aliases
//! - Clock and display-cadence utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
