use crate::metrics::{AggregationError, AggregationKind, NumberKind};
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("unimplemented aggregator: {0}")]
    UnimplementedAggregation(AggregationKind),

    #[error("incompatible aggregation type: declared {declared}, found {found}")]
    IncompatibleAggregation {
        declared: AggregationKind,
        found: AggregationKind,
    },

    #[error("invalid value type: {0}")]
    UnknownValueType(NumberKind),

    #[error("context canceled")]
    ContextCanceled,

    #[error("transforming failed: {0}")]
    TransformFailed(String),

    #[error("transforming failed:\n -{}", .errors.join("\n -"))]
    Transforming {
        errors: Vec<String>,
        partial: Vec<ResourceMetrics>,
    },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("record stream closed before traversal finished")]
    ChannelClosed,

    #[error("record source exited without reporting a result")]
    SourceTerminated,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new checkpoint error
    pub fn checkpoint<S: Into<String>>(msg: S) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Returns true for both a single failed conversion and the aggregate
    /// of per-record failures reported by the sink.
    pub fn is_transform_failed(&self) -> bool {
        matches!(self, Self::TransformFailed(_) | Self::Transforming { .. })
    }

    /// Metrics that were converted successfully alongside the failures.
    pub fn partial_metrics(&self) -> Option<&[ResourceMetrics]> {
        match self {
            Self::Transforming { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Consumes the error, keeping whatever was converted successfully.
    pub fn into_partial_metrics(self) -> Option<Vec<ResourceMetrics>> {
        match self {
            Self::Transforming { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnimplementedAggregation(_)
            | Self::IncompatibleAggregation { .. }
            | Self::UnknownValueType(_)
            | Self::Aggregation(_) => "conversion",
            Self::TransformFailed(_) | Self::Transforming { .. } => "transform",
            Self::ContextCanceled => "canceled",
            Self::ChannelClosed | Self::SourceTerminated => "pipeline",
            Self::Config(_) => "config",
            Self::Checkpoint(_) | Self::Yaml(_) => "checkpoint",
            Self::Io(_) => "io",
        }
    }
}
