//! Checkpoint to OTLP conversion.
//!
//! [`checkpoint_set`] is the entry point: it converts every record of a
//! checkpoint concurrently and groups the resulting metrics by resource,
//! instrumentation scope and metric name. [`record`] converts a single
//! record and the [`value`] module encodes attributes.

pub mod pipeline;
pub mod record;
pub mod sink;
pub mod value;

pub use pipeline::{checkpoint_set, Transformer, DEFAULT_BUFFER};
pub use record::{record, to_nanos};
pub use sink::{sink, TransformResult};
pub use value::{key_values, resource, scope};
