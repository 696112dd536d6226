//! b50reel Common Utilities
//!
//! Shared infrastructure for all b50reel crates:
//! - Error taxonomy and result aliases for the render pipeline
//! - Clock and timing helpers for batch progress and output naming
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
