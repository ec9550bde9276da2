//! In-memory metrics model consumed by the transform.
//!
//! These types mirror what an SDK hands to an exporter at collection time:
//! instrument descriptors, attribute sets, resources, scopes, aggregation
//! payloads and the checkpoint that yields them as records.

pub mod aggregation;
pub mod attributes;
pub mod checkpoint;
pub mod descriptor;
pub mod number;
pub mod record;
pub mod temporality;

pub use aggregation::{
    Aggregation, AggregationError, AggregationKind, Histogram, LastValue, MinMaxSumCount, Points,
    Sum,
};
pub use attributes::{AttributeSet, InstrumentationScope, Resource, ResourceKey};
pub use checkpoint::{Checkpoint, MemoryCheckpoint};
pub use descriptor::{Descriptor, InstrumentKind};
pub use number::{Number, NumberKind};
pub use record::Record;
pub use temporality::{
    CumulativeSelector, DeltaSelector, StatelessSelector, Temporality, TemporalityPreference,
    TemporalitySelector,
};
