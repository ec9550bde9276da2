//! Typed measurement values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric representation declared by an instrument descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberKind {
    /// 64-bit signed integers
    Int64,
    /// 64-bit floating point
    Float64,
    /// The descriptor never declared a kind
    #[default]
    Unspecified,
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumberKind::Int64 => "int64",
            NumberKind::Float64 => "float64",
            NumberKind::Unspecified => "unspecified",
        };
        f.write_str(name)
    }
}

/// A measurement value as stored by an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Integer storage
    Int(i64),
    /// Floating point storage
    Float(f64),
}

impl Number {
    /// Integer view. Floats truncate toward zero and saturate; NaN is 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> i64 {
        match *self {
            Number::Int(v) => v,
            Number::Float(v) => v as i64,
        }
    }

    /// Floating point view. Integers beyond 2^53 lose precision.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float(v)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}
