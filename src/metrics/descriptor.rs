use crate::metrics::NumberKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of instrument that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Histogram,
    CounterObserver,
    UpDownCounterObserver,
    GaugeObserver,
}

impl InstrumentKind {
    /// Instruments recorded inline by application code
    pub fn synchronous(&self) -> bool {
        matches!(self, Self::Counter | Self::UpDownCounter | Self::Histogram)
    }

    /// Instruments observed through callbacks at collection time
    pub fn asynchronous(&self) -> bool {
        !self.synchronous()
    }

    /// Instruments whose measurements are summed
    pub fn adding(&self) -> bool {
        matches!(
            self,
            Self::Counter | Self::UpDownCounter | Self::CounterObserver | Self::UpDownCounterObserver
        )
    }

    /// Adding instruments that only ever increase
    pub fn monotonic(&self) -> bool {
        matches!(self, Self::Counter | Self::CounterObserver)
    }

    /// Observers reporting an already accumulated sum
    pub fn precomputed_sum(&self) -> bool {
        self.adding() && self.asynchronous()
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::UpDownCounter => "up_down_counter",
            Self::Histogram => "histogram",
            Self::CounterObserver => "counter_observer",
            Self::UpDownCounterObserver => "up_down_counter_observer",
            Self::GaugeObserver => "gauge_observer",
        };
        f.write_str(name)
    }
}

/// Static description of an instrument
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    name: String,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    description: String,
    unit: String,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, instrument_kind: InstrumentKind, number_kind: NumberKind) -> Self {
        Self {
            name: name.into(),
            instrument_kind,
            number_kind,
            description: String::new(),
            unit: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrument_kind(&self) -> InstrumentKind {
        self.instrument_kind
    }

    pub fn number_kind(&self) -> NumberKind {
        self.number_kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}
