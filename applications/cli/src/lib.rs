//! Reprise CLI Library
//!
//! Command-line replay of recorded event streams.
//!
//! This library exposes the configuration and output formatting for testing purposes.

pub mod config;
pub mod error;
pub mod output;

// Re-export commonly used types for convenience
pub use crate::config::{CliConfig, OutputSettings, PlaybackSettings};
pub use crate::error::{CliError, Result};
