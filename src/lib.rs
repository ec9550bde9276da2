//! otlp-batch - convert metrics checkpoints into OTLP resource metrics.
//!
//! A checkpoint is the snapshot of every aggregation an SDK collected for
//! one export interval. This crate converts each record into an OTLP wire
//! metric on a pool of concurrent workers and merges the results into the
//! `ResourceMetrics` tree an OTLP exporter sends.
//!
//! # Architecture
//!
//! - `metrics`: the in-memory checkpoint model (descriptors, attributes,
//!   aggregations, temporality selection)
//! - `transform`: record conversion, attribute encoding and the concurrent
//!   pipeline
//! - `core`: errors and configuration
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use otlp_batch::metrics::{CumulativeSelector, MemoryCheckpoint};
//! use otlp_batch::transform::checkpoint_set;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checkpoint = MemoryCheckpoint::load("checkpoint.yaml".as_ref()).await?;
//!     let tree = checkpoint_set(
//!         CancellationToken::new(),
//!         Arc::new(CumulativeSelector),
//!         Arc::new(checkpoint),
//!         4,
//!     )
//!     .await?;
//!     println!("{} resources", tree.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod metrics;
pub mod transform;

// Re-export core types for convenience
pub use crate::core::{Config, Result, TransformError};
pub use crate::transform::{checkpoint_set, Transformer};
