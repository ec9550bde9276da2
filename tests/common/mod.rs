//! Common test utilities and fixtures.
#![allow(dead_code)]

use opentelemetry::KeyValue;
use opentelemetry_proto::tonic::metrics::v1::{metric::Data, number_data_point, Metric};
use otlp_batch::core::{Result, TransformError};
use otlp_batch::metrics::{
    Aggregation, AggregationKind, AttributeSet, Checkpoint, Descriptor, InstrumentKind,
    InstrumentationScope, NumberKind, Record, Resource, TemporalitySelector,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

pub fn interval_start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_714_557_600)
}

pub fn interval_end() -> SystemTime {
    interval_start() + Duration::from_secs(60)
}

pub fn service(name: &str) -> Arc<Resource> {
    Arc::new(Resource::new(vec![KeyValue::new("service.name", name.to_string())]))
}

/// Test fixture builder for records with sensible defaults.
pub struct TestRecordBuilder {
    name: String,
    instrument: InstrumentKind,
    number: NumberKind,
    resource: Arc<Resource>,
    scope: InstrumentationScope,
    attributes: Vec<KeyValue>,
    declared: Option<AggregationKind>,
}

impl TestRecordBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instrument: InstrumentKind::Counter,
            number: NumberKind::Int64,
            resource: service("checkout"),
            scope: InstrumentationScope::new("io.checkout").with_version("1.0.0"),
            attributes: Vec::new(),
            declared: None,
        }
    }

    pub fn instrument(mut self, instrument: InstrumentKind) -> Self {
        self.instrument = instrument;
        self
    }

    pub fn number(mut self, number: NumberKind) -> Self {
        self.number = number;
        self
    }

    pub fn resource(mut self, resource: &Arc<Resource>) -> Self {
        self.resource = Arc::clone(resource);
        self
    }

    pub fn scope(mut self, scope: InstrumentationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn attribute(mut self, kv: KeyValue) -> Self {
        self.attributes.push(kv);
        self
    }

    pub fn declared(mut self, kind: AggregationKind) -> Self {
        self.declared = Some(kind);
        self
    }

    pub fn build(self, aggregation: impl Into<Aggregation>) -> Record {
        let record = Record::new(
            Arc::new(Descriptor::new(self.name, self.instrument, self.number)),
            AttributeSet::new(self.attributes),
            self.resource,
            self.scope,
            aggregation.into(),
            interval_start(),
            interval_end(),
        );
        match self.declared {
            Some(kind) => record.with_declared_kind(kind),
            None => record,
        }
    }
}

/// Checkpoint that cancels `token` once `cancel_after` records were visited,
/// then keeps visiting.
pub struct CancelingCheckpoint {
    pub records: Vec<Record>,
    pub token: CancellationToken,
    pub cancel_after: usize,
}

impl Checkpoint for CancelingCheckpoint {
    fn for_each(
        &self,
        _selector: &dyn TemporalitySelector,
        visit: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<()> {
        for (i, record) in self.records.iter().enumerate() {
            if i == self.cancel_after {
                self.token.cancel();
            }
            visit(record.clone())?;
        }
        Ok(())
    }
}

/// Checkpoint whose traversal fails after visiting its records.
pub struct FailingCheckpoint {
    pub records: Vec<Record>,
}

impl Checkpoint for FailingCheckpoint {
    fn for_each(
        &self,
        _selector: &dyn TemporalitySelector,
        visit: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<()> {
        for record in &self.records {
            visit(record.clone())?;
        }
        Err(TransformError::checkpoint("storage went away"))
    }
}

/// Integer values of a gauge or sum metric, sorted.
pub fn sorted_int_values(metric: &Metric) -> Vec<i64> {
    let points = match metric.data.as_ref() {
        Some(Data::Sum(s)) => &s.data_points,
        Some(Data::Gauge(g)) => &g.data_points,
        other => panic!("Expected a number metric, got {:?}", other),
    };
    let mut values: Vec<i64> = points
        .iter()
        .map(|p| match p.value {
            Some(number_data_point::Value::AsInt(v)) => v,
            ref other => panic!("Expected an integer point, got {:?}", other),
        })
        .collect();
    values.sort_unstable();
    values
}
