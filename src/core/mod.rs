//! Error types and configuration shared by the crate.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel, LoggingConfig, PipelineConfig};
pub use error::{Result, TransformError};
