//! Concurrent conversion of a checkpoint.
//!
//! The pipeline has three stages:
//!
//! 1. A source that runs the checkpoint traversal on the blocking pool and
//!    forwards records over a bounded channel.
//! 2. A fixed pool of workers that share the record receiver, convert each
//!    record and emit a [`TransformResult`].
//! 3. The [`sink`] that merges results into the resource tree.
//!
//! Cancellation is observed whenever the source or a worker waits to send.
//! Workers finish the conversion they hold before they notice it.

use crate::core::config::PipelineConfig;
use crate::core::{Result, TransformError};
use crate::metrics::{Checkpoint, Record, TemporalitySelector};
use crate::transform::record::record as convert;
use crate::transform::sink::{sink, TransformResult};
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Default capacity of the record and result channels
pub const DEFAULT_BUFFER: usize = 64;

type SharedRecords = Arc<Mutex<mpsc::Receiver<Record>>>;

/// Reusable pipeline settings.
#[derive(Clone)]
pub struct Transformer {
    selector: Arc<dyn TemporalitySelector>,
    workers: usize,
    record_buffer: usize,
    result_buffer: usize,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("workers", &self.workers)
            .field("record_buffer", &self.record_buffer)
            .field("result_buffer", &self.result_buffer)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    pub fn new(selector: Arc<dyn TemporalitySelector>, workers: usize) -> Self {
        Self {
            selector,
            workers,
            record_buffer: DEFAULT_BUFFER,
            result_buffer: DEFAULT_BUFFER,
        }
    }

    /// Builds a transformer from the pipeline section of the configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.temporality.selector(), config.workers)
            .with_buffers(config.record_buffer, config.result_buffer)
    }

    /// Sets the channel capacities. Zero is raised to one.
    pub fn with_buffers(mut self, records: usize, results: usize) -> Self {
        self.record_buffer = records.max(1);
        self.result_buffer = results.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Converts every record of `checkpoint`.
    ///
    /// Per-record failures come back as [`TransformError::Transforming`]
    /// carrying the metrics that did convert. Cancellation and traversal
    /// errors discard the tree.
    pub async fn transform(
        &self,
        token: CancellationToken,
        checkpoint: Arc<dyn Checkpoint>,
    ) -> Result<Vec<ResourceMetrics>> {
        if self.workers == 0 {
            tracing::warn!("Transform requested with zero workers, nothing will be converted");
            return Ok(Vec::new());
        }
        tracing::debug!(
            "Starting transform with {} workers (record buffer {}, result buffer {})",
            self.workers,
            self.record_buffer,
            self.result_buffer
        );

        let (records, source_done) = start_source(
            token.clone(),
            Arc::clone(&self.selector),
            checkpoint,
            self.record_buffer,
        );
        let records: SharedRecords = Arc::new(Mutex::new(records));

        let (results_tx, results_rx) = mpsc::channel(self.result_buffer);
        let handles: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|worker_id| {
                tokio::spawn(worker(
                    worker_id,
                    token.clone(),
                    Arc::clone(&self.selector),
                    Arc::clone(&records),
                    results_tx.clone(),
                ))
            })
            .collect();
        // The results channel closes once the last worker drops its sender.
        drop(results_tx);
        drop(records);

        let merged = sink(results_rx).await;

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Transform worker failed: {}", e);
            }
        }

        let tree = merged?;

        match source_done.await {
            Ok(Ok(())) => {
                tracing::debug!("Transform finished with {} resource groups", tree.len());
                Ok(tree)
            },
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransformError::SourceTerminated),
        }
    }
}

/// Converts `checkpoint` into OTLP resource metrics using `worker_count`
/// concurrent workers and the default channel capacities.
pub async fn checkpoint_set(
    token: CancellationToken,
    selector: Arc<dyn TemporalitySelector>,
    checkpoint: Arc<dyn Checkpoint>,
    worker_count: usize,
) -> Result<Vec<ResourceMetrics>> {
    Transformer::new(selector, worker_count)
        .transform(token, checkpoint)
        .await
}

/// Runs the traversal on the blocking pool.
///
/// The record sender is dropped before the terminal result is reported, so
/// consumers see the end of the stream first.
fn start_source(
    token: CancellationToken,
    selector: Arc<dyn TemporalitySelector>,
    checkpoint: Arc<dyn Checkpoint>,
    capacity: usize,
) -> (mpsc::Receiver<Record>, oneshot::Receiver<Result<()>>) {
    let (records_tx, records_rx) = mpsc::channel(capacity);
    let (done_tx, done_rx) = oneshot::channel();
    let handle = Handle::current();

    task::spawn_blocking(move || {
        let mut forwarded = 0usize;
        let outcome = checkpoint.for_each(selector.as_ref(), &mut |record| {
            let (token, records_tx) = (&token, &records_tx);
            handle.block_on(async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(TransformError::ContextCanceled),
                    sent = records_tx.send(record) => {
                        sent.map_err(|_| TransformError::ChannelClosed)
                    },
                }
            })?;
            forwarded += 1;
            Ok(())
        });
        drop(records_tx);

        match &outcome {
            Ok(()) => tracing::debug!("Checkpoint source forwarded {} records", forwarded),
            Err(e) => tracing::debug!(
                "Checkpoint source stopped after {} records: {}",
                forwarded,
                e
            ),
        }
        // The orchestrator may already have returned on a sink error.
        let _ = done_tx.send(outcome);
    });

    (records_rx, done_rx)
}

async fn worker(
    worker_id: usize,
    token: CancellationToken,
    selector: Arc<dyn TemporalitySelector>,
    records: SharedRecords,
    results: mpsc::Sender<TransformResult>,
) {
    let mut converted = 0usize;

    while let Some(record) = {
        let mut rx = records.lock().await;
        rx.recv().await
    } {
        let outcome = match convert(selector.as_ref(), &record) {
            Ok(Some(metric)) => Ok(metric),
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        let result = TransformResult {
            resource: Arc::clone(record.resource()),
            scope: record.scope().clone(),
            outcome,
        };

        let sent = tokio::select! {
            biased;
            () = token.cancelled() => false,
            sent = results.send(result) => sent.is_ok(),
        };
        if !sent {
            break;
        }
        converted += 1;
    }

    tracing::debug!("Transform worker {} stopped after {} results", worker_id, converted);
}
