//! Command-line interface for otlp-batch.
//!
//! Loads a checkpoint file, converts it to OTLP resource metrics and prints
//! a summary of the resulting tree.

use crate::core::{Config, LogLevel, LoggingConfig, Result, TransformError};
use crate::metrics::{MemoryCheckpoint, TemporalityPreference};
use crate::transform::Transformer;
use clap::Parser;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Metric, ResourceMetrics};
use prost::Message;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Environment variable overriding the configured log level
pub const LOG_ENV: &str = "OTLP_BATCH_LOG";

/// Convert a metrics checkpoint into batched OTLP resource metrics
#[derive(Parser, Debug)]
#[command(name = "otlp-batch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Checkpoint file (YAML)
    pub checkpoint: Option<PathBuf>,

    /// Number of concurrent transform workers
    #[arg(short, long, env = "OTLP_BATCH_WORKERS")]
    pub workers: Option<usize>,

    /// Temporality for sums and histograms (cumulative, delta, stateless)
    #[arg(short, long, env = "OTLP_BATCH_TEMPORALITY")]
    pub temporality: Option<TemporalityPreference>,

    /// Cancel the transform after this long (e.g. 500ms, 2s)
    #[arg(long, env = "OTLP_BATCH_DEADLINE", value_parser = humantime_serde::re::humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Configuration file path (default: ~/.config/otlp-batch/config.yaml)
    #[arg(short, long, env = "OTLP_BATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the protobuf-encoded export request to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "OTLP_BATCH_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments and their environment variables (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        use crate::core::config::ConfigBuilder;

        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("otlp-batch").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/otlp-batch/config.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return self.build_config_from_args(builder);
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
            },
            Err(e) if self.config.is_some() => {
                return Err(TransformError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            Err(_) => {},
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: crate::core::config::ConfigBuilder) -> Result<Config> {
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(temporality) = self.temporality {
            builder = builder.temporality(temporality);
        }
        if let Some(deadline) = self.deadline {
            builder = builder.deadline(deadline);
        }
        if self.debug {
            builder = builder.log_level(LogLevel::Debug);
        }

        builder.debug(self.debug).build()
    }

    /// Filter directive: `--debug`, then `OTLP_BATCH_LOG`, then the config.
    fn log_directive(&self, logging: &LoggingConfig, env_level: Option<String>) -> String {
        if self.debug {
            return "debug".to_string();
        }
        env_level.unwrap_or_else(|| logging.level.as_str().to_string())
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, logging: &LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = self.log_directive(logging, std::env::var(LOG_ENV).ok());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TransformError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the otlp-batch command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config.logging)?;

    if cli.check_config {
        config.validate()?;
        println!("Configuration is valid!");
        println!("  Workers: {}", config.pipeline.workers);
        println!("  Record buffer: {}", config.pipeline.record_buffer);
        println!("  Result buffer: {}", config.pipeline.result_buffer);
        println!("  Temporality: {:?}", config.pipeline.temporality);
        return Ok(());
    }

    let path = cli
        .checkpoint
        .as_deref()
        .ok_or_else(|| TransformError::config("a checkpoint file is required"))?;
    let checkpoint = MemoryCheckpoint::load(path).await?;
    tracing::info!("Loaded {} records from {:?}", checkpoint.len(), path);

    let transformer = Transformer::from_config(&config.pipeline);
    let token = CancellationToken::new();
    let watchdog = tokio::spawn(cancel_on_interrupt(token.clone(), config.pipeline.deadline));

    let outcome = transformer.transform(token, Arc::new(checkpoint)).await;
    watchdog.abort();

    // Partial results are still reported before the aggregate error.
    let (tree, failure) = match outcome {
        Ok(tree) => (tree, None),
        Err(TransformError::Transforming { errors, partial }) => (
            partial,
            Some(TransformError::Transforming {
                errors,
                partial: Vec::new(),
            }),
        ),
        Err(e) => return Err(e),
    };

    print!("{}", summarize(&tree));

    if let Some(output) = &cli.output {
        write_request(output, tree).await?;
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn cancel_on_interrupt(token: CancellationToken, deadline: Option<Duration>) {
    let expired = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, canceling transform");
        },
        () = expired => {
            tracing::warn!("Deadline of {:?} reached, canceling transform", deadline.unwrap_or_default());
        },
    }
    token.cancel();
}

async fn write_request(path: &Path, resource_metrics: Vec<ResourceMetrics>) -> Result<()> {
    let request = ExportMetricsServiceRequest { resource_metrics };
    let encoded = request.encode_to_vec();
    tokio::fs::write(path, &encoded).await?;
    tracing::info!("Wrote {} bytes to {:?}", encoded.len(), path);
    Ok(())
}

/// Renders one line per resource, scope and metric.
pub fn summarize(tree: &[ResourceMetrics]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for resource_metrics in tree {
        let attributes = resource_metrics
            .resource
            .as_ref()
            .map(|r| render_attributes(&r.attributes))
            .unwrap_or_default();
        let _ = writeln!(out, "resource {{{}}}", attributes);

        for scope_metrics in &resource_metrics.scope_metrics {
            match &scope_metrics.scope {
                Some(scope) if !scope.version.is_empty() => {
                    let _ = writeln!(out, "  scope {}@{}", scope.name, scope.version);
                },
                Some(scope) => {
                    let _ = writeln!(out, "  scope {}", scope.name);
                },
                None => {
                    let _ = writeln!(out, "  scope <none>");
                },
            }
            for metric in &scope_metrics.metrics {
                let (shape, points) = shape_and_points(metric);
                let _ = writeln!(out, "    {} {} points={}", metric.name, shape, points);
            }
        }
    }
    out
}

fn shape_and_points(metric: &Metric) -> (&'static str, usize) {
    match &metric.data {
        Some(Data::Gauge(g)) => ("gauge", g.data_points.len()),
        Some(Data::Sum(s)) => ("sum", s.data_points.len()),
        Some(Data::Histogram(h)) => ("histogram", h.data_points.len()),
        Some(Data::Summary(s)) => ("summary", s.data_points.len()),
        Some(Data::ExponentialHistogram(h)) => ("exponential_histogram", h.data_points.len()),
        None => ("empty", 0),
    }
}

fn render_attributes(attributes: &[KeyValue]) -> String {
    attributes
        .iter()
        .map(|kv| {
            let value = kv.value.as_ref().map(render_value).unwrap_or_default();
            format!("{}={}", kv.key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_value(value: &AnyValue) -> String {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(arr)) => {
            let items: Vec<String> = arr.values.iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        },
        Some(other) => format!("{:?}", other),
        None => String::new(),
    }
}
