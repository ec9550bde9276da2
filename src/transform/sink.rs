//! Merge sink: groups converted metrics into the OTLP resource tree.

use crate::core::{Result, TransformError};
use crate::metrics::{InstrumentationScope, Resource, ResourceKey};
use crate::transform::value;
use ahash::AHashMap;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope as ProtoScope;
use opentelemetry_proto::tonic::metrics::v1::{metric::Data, Metric, ResourceMetrics, ScopeMetrics};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of converting one record, tagged with where it belongs.
#[derive(Debug)]
pub struct TransformResult {
    pub resource: Arc<Resource>,
    pub scope: InstrumentationScope,
    pub outcome: Result<Metric>,
}

struct ScopeGroup {
    encoded: Option<ProtoScope>,
    metrics: Vec<Metric>,
    by_name: AHashMap<String, usize>,
}

struct ResourceGroup {
    encoded: ProtoResource,
    scopes: Vec<ScopeGroup>,
    by_scope: AHashMap<InstrumentationScope, usize>,
}

/// Three level grouping, resource then scope then metric name. Groups keep
/// the order in which they were first seen.
#[derive(Default)]
struct Grouping {
    resources: Vec<ResourceGroup>,
    by_resource: AHashMap<ResourceKey, usize>,
    errors: Vec<String>,
}

impl Grouping {
    fn accept(&mut self, result: TransformResult) {
        match result.outcome {
            Ok(metric) => self.add(&result.resource, result.scope, metric),
            Err(e) => {
                tracing::debug!("Dropping record that failed to convert: {}", e);
                self.errors.push(e.to_string());
            },
        }
    }

    fn add(&mut self, resource: &Resource, scope: InstrumentationScope, metric: Metric) {
        let resource_idx = *self
            .by_resource
            .entry(resource.equivalent())
            .or_insert_with(|| {
                self.resources.push(ResourceGroup {
                    encoded: value::resource(resource),
                    scopes: Vec::new(),
                    by_scope: AHashMap::new(),
                });
                self.resources.len() - 1
            });
        let resource_group = &mut self.resources[resource_idx];

        let scope_idx = match resource_group.by_scope.get(&scope) {
            Some(idx) => *idx,
            None => {
                resource_group.scopes.push(ScopeGroup {
                    encoded: value::scope(&scope),
                    metrics: Vec::new(),
                    by_name: AHashMap::new(),
                });
                let idx = resource_group.scopes.len() - 1;
                resource_group.by_scope.insert(scope, idx);
                idx
            },
        };
        let scope_group = &mut resource_group.scopes[scope_idx];

        match scope_group.by_name.get(&metric.name) {
            Some(&idx) => {
                if let Err(e) = merge_points(&mut scope_group.metrics[idx], metric) {
                    self.errors.push(e);
                }
            },
            None => {
                scope_group
                    .by_name
                    .insert(metric.name.clone(), scope_group.metrics.len());
                scope_group.metrics.push(metric);
            },
        }
    }

    fn finish(self) -> Result<Vec<ResourceMetrics>> {
        if self.resources.is_empty() {
            if !self.errors.is_empty() {
                tracing::warn!(
                    "No metrics converted, dropping {} errors: {}",
                    self.errors.len(),
                    self.errors.join("; ")
                );
            }
            return Ok(Vec::new());
        }

        let tree: Vec<ResourceMetrics> = self
            .resources
            .into_iter()
            .map(|group| ResourceMetrics {
                resource: Some(group.encoded),
                scope_metrics: group
                    .scopes
                    .into_iter()
                    .map(|scope| ScopeMetrics {
                        scope: scope.encoded,
                        metrics: scope.metrics,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            })
            .collect();

        if self.errors.is_empty() {
            Ok(tree)
        } else {
            Err(TransformError::Transforming {
                errors: self.errors,
                partial: tree,
            })
        }
    }
}

fn shape_name(data: Option<&Data>) -> &'static str {
    match data {
        Some(Data::Gauge(_)) => "gauge",
        Some(Data::Sum(_)) => "sum",
        Some(Data::Histogram(_)) => "histogram",
        Some(Data::Summary(_)) => "summary",
        Some(Data::ExponentialHistogram(_)) => "exponential_histogram",
        None => "empty",
    }
}

/// Appends the points of `incoming` to `existing`. Both must carry the same
/// known data shape.
fn merge_points(existing: &mut Metric, incoming: Metric) -> std::result::Result<(), String> {
    match (existing.data.as_mut(), incoming.data) {
        (Some(Data::Gauge(into)), Some(Data::Gauge(from))) => {
            into.data_points.extend(from.data_points);
        },
        (Some(Data::Sum(into)), Some(Data::Sum(from))) => {
            into.data_points.extend(from.data_points);
        },
        (Some(Data::Histogram(into)), Some(Data::Histogram(from))) => {
            into.data_points.extend(from.data_points);
        },
        (Some(Data::Summary(into)), Some(Data::Summary(from))) => {
            into.data_points.extend(from.data_points);
        },
        (into, from) => {
            let (into, from) = (shape_name(into.map(|d| &*d)), shape_name(from.as_ref()));
            return Err(if into == from {
                format!("unsupported metric type: {} ({})", into, existing.name)
            } else {
                format!(
                    "incompatible metric types for {}: {} and {}",
                    existing.name, into, from
                )
            });
        },
    }
    Ok(())
}

/// Drains `results` until every sender is gone and builds the output tree.
///
/// Failed conversions and merge conflicts do not stop the sink. When any
/// occurred alongside converted metrics the result is
/// [`TransformError::Transforming`], which still owns the tree.
pub async fn sink(mut results: mpsc::Receiver<TransformResult>) -> Result<Vec<ResourceMetrics>> {
    let mut grouping = Grouping::default();
    let mut received = 0usize;
    while let Some(result) = results.recv().await {
        received += 1;
        grouping.accept(result);
    }
    tracing::debug!(
        "Sink drained {} results into {} resource groups",
        received,
        grouping.resources.len()
    );
    grouping.finish()
}
