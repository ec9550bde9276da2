//! Configuration management for otlp-batch.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by the CLI)
//! - Validation and defaults

use crate::core::{Result, TransformError};
use crate::metrics::TemporalityPreference;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Complete configuration for otlp-batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of concurrent transform workers
    pub workers: usize,
    /// Capacity of the channel between the checkpoint source and the workers
    pub record_buffer: usize,
    /// Capacity of the channel between the workers and the merge sink
    pub result_buffer: usize,
    /// Temporality reported for sums and histograms
    pub temporality: TemporalityPreference,
    /// Cancel the transform when it runs longer than this
    #[serde(with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            record_buffer: crate::transform::DEFAULT_BUFFER,
            result_buffer: crate::transform::DEFAULT_BUFFER,
            temporality: TemporalityPreference::default(),
            deadline: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(TransformError::config("workers must be greater than 0"));
        }

        if self.pipeline.record_buffer == 0 {
            return Err(TransformError::config("record_buffer must be greater than 0"));
        }

        if self.pipeline.result_buffer == 0 {
            return Err(TransformError::config("result_buffer must be greater than 0"));
        }

        if self.pipeline.deadline == Some(Duration::ZERO) {
            return Err(TransformError::config("deadline must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| TransformError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.pipeline.workers = workers;
        self
    }

    /// Set both channel capacities
    pub fn buffers(mut self, records: usize, results: usize) -> Self {
        self.config.pipeline.record_buffer = records;
        self.config.pipeline.result_buffer = results;
        self
    }

    /// Set temporality preference
    pub fn temporality(mut self, temporality: TemporalityPreference) -> Self {
        self.config.pipeline.temporality = temporality;
        self
    }

    /// Set transform deadline
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.pipeline.deadline = Some(deadline);
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
