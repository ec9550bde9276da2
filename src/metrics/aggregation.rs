//! Aggregation results as produced by the upstream aggregators.
//!
//! A record carries both the aggregation kind its aggregator declared and
//! the payload itself. Conversion matches the declared kind against the
//! payload variant, so a payload that cannot serve its declared kind is
//! reported instead of silently converted.

use crate::metrics::Number;
use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Errors raised when reading an aggregation payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no data collected by this aggregator")]
    NoData,
}

/// Aggregation algorithm declared by an aggregator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    MinMaxSumCount,
    Histogram,
    Sum,
    LastValue,
    Points,
    /// A kind this crate has no conversion rule for
    Other(Cow<'static, str>),
}

impl AggregationKind {
    pub fn other(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Other(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::MinMaxSumCount => "min_max_sum_count",
            Self::Histogram => "histogram",
            Self::Sum => "sum",
            Self::LastValue => "last_value",
            Self::Points => "points",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Min, max, sum and count of the recorded measurements
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxSumCount {
    min: Option<Number>,
    max: Option<Number>,
    sum: Number,
    count: u64,
}

impl MinMaxSumCount {
    pub fn new(min: Number, max: Number, sum: Number, count: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            sum,
            count,
        }
    }

    /// An aggregator that has not seen any measurement yet.
    pub fn empty() -> Self {
        Self {
            min: None,
            max: None,
            sum: Number::Int(0),
            count: 0,
        }
    }

    pub fn min(&self) -> Result<Number, AggregationError> {
        self.min.ok_or(AggregationError::NoData)
    }

    pub fn max(&self) -> Result<Number, AggregationError> {
        self.max.ok_or(AggregationError::NoData)
    }

    pub fn sum(&self) -> Number {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Explicit-bucket histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
    sum: Number,
    count: u64,
}

impl Histogram {
    /// `counts` is expected to hold one more entry than `boundaries`; the
    /// mismatch is reported at conversion time, not here.
    pub fn new(boundaries: Vec<f64>, counts: Vec<u64>, sum: Number, count: u64) -> Self {
        Self {
            boundaries,
            counts,
            sum,
            count,
        }
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn sum(&self) -> Number {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Running sum
#[derive(Debug, Clone, PartialEq)]
pub struct Sum {
    value: Option<Number>,
}

impl Sum {
    pub fn new(value: impl Into<Number>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// An observer that did not report during the interval.
    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn sum(&self) -> Result<Number, AggregationError> {
        self.value.ok_or(AggregationError::NoData)
    }
}

/// Most recent measurement and when it was taken
#[derive(Debug, Clone, PartialEq)]
pub struct LastValue {
    observed: Option<(Number, SystemTime)>,
}

impl LastValue {
    pub fn new(value: impl Into<Number>, at: SystemTime) -> Self {
        Self {
            observed: Some((value.into(), at)),
        }
    }

    pub fn empty() -> Self {
        Self { observed: None }
    }

    pub fn last_value(&self) -> Result<(Number, SystemTime), AggregationError> {
        self.observed.ok_or(AggregationError::NoData)
    }
}

/// Every raw measurement of the interval, unordered
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Points {
    samples: Vec<Number>,
}

impl Points {
    pub fn new(samples: Vec<Number>) -> Self {
        Self { samples }
    }

    pub fn points(&self) -> &[Number] {
        &self.samples
    }
}

/// Aggregation payload of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    MinMaxSumCount(MinMaxSumCount),
    Histogram(Histogram),
    Sum(Sum),
    LastValue(LastValue),
    Points(Points),
}

impl Aggregation {
    /// Kind implied by the payload variant.
    pub fn kind(&self) -> AggregationKind {
        match self {
            Aggregation::MinMaxSumCount(_) => AggregationKind::MinMaxSumCount,
            Aggregation::Histogram(_) => AggregationKind::Histogram,
            Aggregation::Sum(_) => AggregationKind::Sum,
            Aggregation::LastValue(_) => AggregationKind::LastValue,
            Aggregation::Points(_) => AggregationKind::Points,
        }
    }
}

impl From<MinMaxSumCount> for Aggregation {
    fn from(a: MinMaxSumCount) -> Self {
        Aggregation::MinMaxSumCount(a)
    }
}

impl From<Histogram> for Aggregation {
    fn from(a: Histogram) -> Self {
        Aggregation::Histogram(a)
    }
}

impl From<Sum> for Aggregation {
    fn from(a: Sum) -> Self {
        Aggregation::Sum(a)
    }
}

impl From<LastValue> for Aggregation {
    fn from(a: LastValue) -> Self {
        Aggregation::LastValue(a)
    }
}

impl From<Points> for Aggregation {
    fn from(a: Points) -> Self {
        Aggregation::Points(a)
    }
}
