//! Temporality selection.
//!
//! The exporter decides per instrument whether sums and histograms are
//! reported cumulatively or as deltas; the transform only asks.

use crate::metrics::{AggregationKind, Descriptor};
use opentelemetry_proto::tonic::metrics::v1::AggregationTemporality;
use serde::{Deserialize, Serialize};

/// Window a Sum or Histogram value was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Temporality {
    /// Accumulated since the instrument started
    Cumulative,
    /// Accumulated since the previous collection
    Delta,
}

impl From<Temporality> for AggregationTemporality {
    fn from(t: Temporality) -> Self {
        match t {
            Temporality::Cumulative => AggregationTemporality::Cumulative,
            Temporality::Delta => AggregationTemporality::Delta,
        }
    }
}

/// Policy deciding the temporality of each exported instrument
pub trait TemporalitySelector: Send + Sync {
    fn temporality_for(&self, descriptor: &Descriptor, kind: &AggregationKind) -> Temporality;
}

/// Reports everything cumulatively
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeSelector;

impl TemporalitySelector for CumulativeSelector {
    fn temporality_for(&self, _: &Descriptor, _: &AggregationKind) -> Temporality {
        Temporality::Cumulative
    }
}

/// Reports everything as deltas
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaSelector;

impl TemporalitySelector for DeltaSelector {
    fn temporality_for(&self, _: &Descriptor, _: &AggregationKind) -> Temporality {
        Temporality::Delta
    }
}

/// Avoids keeping state in the exporter: deltas everywhere, except sums of
/// observers that already report an accumulated value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatelessSelector;

impl TemporalitySelector for StatelessSelector {
    fn temporality_for(&self, descriptor: &Descriptor, kind: &AggregationKind) -> Temporality {
        if *kind == AggregationKind::Sum && descriptor.instrument_kind().precomputed_sum() {
            Temporality::Cumulative
        } else {
            Temporality::Delta
        }
    }
}

/// Serializable choice of selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalityPreference {
    #[default]
    Cumulative,
    Delta,
    Stateless,
}

impl TemporalityPreference {
    pub fn selector(self) -> std::sync::Arc<dyn TemporalitySelector> {
        match self {
            Self::Cumulative => std::sync::Arc::new(CumulativeSelector),
            Self::Delta => std::sync::Arc::new(DeltaSelector),
            Self::Stateless => std::sync::Arc::new(StatelessSelector),
        }
    }
}

impl std::str::FromStr for TemporalityPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cumulative" => Ok(Self::Cumulative),
            "delta" => Ok(Self::Delta),
            "stateless" => Ok(Self::Stateless),
            _ => Err(format!("Unknown temporality: {}", s)),
        }
    }
}
