//! Checkpoint traversal and the YAML checkpoint format.

use crate::core::{Result, TransformError};
use crate::metrics::{
    Aggregation, AggregationKind, AttributeSet, Descriptor, Histogram, InstrumentKind,
    InstrumentationScope, LastValue, MinMaxSumCount, Number, NumberKind, Points, Record,
    Resource, Sum, TemporalitySelector,
};
use chrono::{DateTime, Utc};
use opentelemetry::{Array, KeyValue, StringValue, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Snapshot of every record collected for one export interval.
///
/// `for_each` must call `visit` once per record, stop at the first error
/// `visit` returns and hand that error back.
pub trait Checkpoint: Send + Sync {
    fn for_each(
        &self,
        selector: &dyn TemporalitySelector,
        visit: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<()>;
}

/// Checkpoint held in memory, visited in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    records: Vec<Record>,
}

impl MemoryCheckpoint {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parses a checkpoint document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: CheckpointFile = serde_yaml::from_str(yaml)?;
        file.into_checkpoint()
    }

    /// Reads and parses a checkpoint file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TransformError::checkpoint(format!("Failed to read checkpoint {:?}: {}", path, e))
        })?;
        Self::from_yaml(&content)
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn for_each(
        &self,
        _selector: &dyn TemporalitySelector,
        visit: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<()> {
        for record in &self.records {
            visit(record.clone())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CheckpointFile {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    resources: Vec<ResourceSpec>,
}

#[derive(Debug, Deserialize)]
struct ResourceSpec {
    #[serde(default)]
    attributes: BTreeMap<String, AttributeSpec>,
    #[serde(default)]
    scopes: Vec<ScopeSpec>,
}

#[derive(Debug, Deserialize)]
struct ScopeSpec {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    records: Vec<RecordSpec>,
}

#[derive(Debug, Deserialize)]
struct RecordSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    unit: String,
    instrument: InstrumentKind,
    #[serde(default)]
    number: NumberKind,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeSpec>,
    aggregation: AggregationSpec,
    /// Kind reported by the aggregator when it differs from the payload
    declared_kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AggregationSpec {
    Sum {
        value: Option<Number>,
    },
    LastValue {
        value: Option<Number>,
        time: Option<DateTime<Utc>>,
    },
    MinMaxSumCount {
        min: Option<Number>,
        max: Option<Number>,
        sum: Number,
        count: u64,
    },
    Histogram {
        boundaries: Vec<f64>,
        counts: Vec<u64>,
        sum: Number,
        count: u64,
    },
    Points {
        #[serde(default)]
        values: Vec<Number>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AttributeSpec {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bools(Vec<bool>),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
}

impl From<AttributeSpec> for Value {
    fn from(spec: AttributeSpec) -> Self {
        match spec {
            AttributeSpec::Bool(v) => Value::Bool(v),
            AttributeSpec::Int(v) => Value::I64(v),
            AttributeSpec::Float(v) => Value::F64(v),
            AttributeSpec::String(v) => Value::from(v),
            AttributeSpec::Bools(v) => Value::Array(Array::Bool(v)),
            AttributeSpec::Ints(v) => Value::Array(Array::I64(v)),
            AttributeSpec::Floats(v) => Value::Array(Array::F64(v)),
            AttributeSpec::Strings(v) => {
                Value::Array(Array::String(v.into_iter().map(StringValue::from).collect()))
            },
        }
    }
}

fn attribute_set(attributes: BTreeMap<String, AttributeSpec>) -> AttributeSet {
    attributes
        .into_iter()
        .map(|(key, value)| KeyValue::new(key, Value::from(value)))
        .collect()
}

fn declared_kind(name: &str) -> AggregationKind {
    match name {
        "min_max_sum_count" => AggregationKind::MinMaxSumCount,
        "histogram" => AggregationKind::Histogram,
        "sum" => AggregationKind::Sum,
        "last_value" => AggregationKind::LastValue,
        "points" => AggregationKind::Points,
        other => AggregationKind::other(other.to_string()),
    }
}

impl AggregationSpec {
    fn into_aggregation(self, end: SystemTime) -> Aggregation {
        match self {
            AggregationSpec::Sum { value: Some(v) } => Sum::new(v).into(),
            AggregationSpec::Sum { value: None } => Sum::empty().into(),
            AggregationSpec::LastValue { value: Some(v), time } => {
                LastValue::new(v, time.map_or(end, SystemTime::from)).into()
            },
            AggregationSpec::LastValue { value: None, .. } => LastValue::empty().into(),
            AggregationSpec::MinMaxSumCount {
                min: Some(min),
                max: Some(max),
                sum,
                count,
            } => MinMaxSumCount::new(min, max, sum, count).into(),
            AggregationSpec::MinMaxSumCount { .. } => MinMaxSumCount::empty().into(),
            AggregationSpec::Histogram {
                boundaries,
                counts,
                sum,
                count,
            } => Histogram::new(boundaries, counts, sum, count).into(),
            AggregationSpec::Points { values } => Points::new(values).into(),
        }
    }
}

impl CheckpointFile {
    fn into_checkpoint(self) -> Result<MemoryCheckpoint> {
        let end = self.end.map_or_else(SystemTime::now, SystemTime::from);
        let start = self.start.map_or(SystemTime::UNIX_EPOCH, SystemTime::from);
        if start > end {
            return Err(TransformError::checkpoint("checkpoint start is after its end"));
        }

        let mut checkpoint = MemoryCheckpoint::default();
        for resource_spec in self.resources {
            let resource = Arc::new(Resource::new(attribute_set(resource_spec.attributes)));
            for scope_spec in resource_spec.scopes {
                let scope = InstrumentationScope {
                    name: scope_spec.name,
                    version: scope_spec.version,
                };
                for spec in scope_spec.records {
                    if spec.name.is_empty() {
                        return Err(TransformError::checkpoint("record name cannot be empty"));
                    }
                    let descriptor = Descriptor::new(spec.name, spec.instrument, spec.number)
                        .with_description(spec.description)
                        .with_unit(spec.unit);
                    let mut record = Record::new(
                        Arc::new(descriptor),
                        attribute_set(spec.attributes),
                        Arc::clone(&resource),
                        scope.clone(),
                        spec.aggregation.into_aggregation(end),
                        start,
                        end,
                    );
                    if let Some(kind) = spec.declared_kind.as_deref() {
                        record = record.with_declared_kind(declared_kind(kind));
                    }
                    checkpoint.push(record);
                }
            }
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CumulativeSelector;

    const CHECKPOINT: &str = r#"
start: 2024-05-01T10:00:00Z
end: 2024-05-01T10:01:00Z
resources:
  - attributes:
      service.name: checkout
      replicas: 3
    scopes:
      - name: io.checkout
        version: "1.4.0"
        records:
          - name: requests
            instrument: counter
            number: int64
            unit: "1"
            attributes:
              route: /pay
              retried: false
              zones: [eu-1, eu-2]
            aggregation:
              kind: sum
              value: 5
          - name: queue.depth
            instrument: gauge_observer
            number: float64
            aggregation:
              kind: last_value
              value: 12.5
          - name: sketchy
            instrument: histogram
            number: float64
            declared_kind: exponential_histogram
            aggregation:
              kind: points
              values: [1.5, 2]
"#;

    #[test]
    fn test_parse_checkpoint() {
        let checkpoint = MemoryCheckpoint::from_yaml(CHECKPOINT).unwrap();
        assert_eq!(checkpoint.len(), 3);

        let requests = &checkpoint.records()[0];
        assert_eq!(requests.descriptor().name(), "requests");
        assert_eq!(requests.descriptor().number_kind(), NumberKind::Int64);
        assert_eq!(requests.scope().version, "1.4.0");
        assert_eq!(requests.aggregation(), &Aggregation::Sum(Sum::new(5_i64)));
        assert_eq!(
            requests.attributes().get("zones"),
            Some(&Value::Array(Array::String(vec!["eu-1".into(), "eu-2".into()])))
        );
        assert_eq!(requests.attributes().get("retried"), Some(&Value::Bool(false)));

        let gauge = &checkpoint.records()[1];
        let (value, at) = match gauge.aggregation() {
            Aggregation::LastValue(lv) => lv.last_value().unwrap(),
            other => panic!("Expected last value, got {:?}", other),
        };
        assert_eq!(value, Number::Float(12.5));
        assert_eq!(at, gauge.end_time());

        let sketchy = &checkpoint.records()[2];
        assert_eq!(sketchy.aggregation_kind(), &AggregationKind::other("exponential_histogram"));
        assert_eq!(sketchy.aggregation().kind(), AggregationKind::Points);
    }

    #[test]
    fn test_records_share_resource() {
        let checkpoint = MemoryCheckpoint::from_yaml(CHECKPOINT).unwrap();
        let records = checkpoint.records();
        assert!(Arc::ptr_eq(records[0].resource(), records[1].resource()));
        assert_eq!(
            records[0].resource().attributes().get("replicas"),
            Some(&Value::I64(3))
        );
    }

    #[test]
    fn test_blank_and_missing_versions_match() {
        let yaml = r#"
resources:
  - scopes:
      - name: io.x
        records:
          - name: requests
            instrument: counter
            number: int64
            aggregation: {kind: sum, value: 1}
      - name: io.x
        version: ""
        records:
          - name: requests
            instrument: counter
            number: int64
            aggregation: {kind: sum, value: 2}
"#;
        let checkpoint = MemoryCheckpoint::from_yaml(yaml).unwrap();
        let records = checkpoint.records();
        assert_eq!(records[0].scope(), records[1].scope());
        assert_eq!(records[0].scope().version, "");
    }

    #[test]
    fn test_invalid_interval() {
        let yaml = "start: 2024-05-01T10:01:00Z\nend: 2024-05-01T10:00:00Z\n";
        assert!(MemoryCheckpoint::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_for_each_stops_on_error() {
        let checkpoint = MemoryCheckpoint::from_yaml(CHECKPOINT).unwrap();
        let mut seen = 0;
        let result = checkpoint.for_each(&CumulativeSelector, &mut |_| {
            seen += 1;
            if seen == 2 {
                Err(TransformError::ContextCanceled)
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(TransformError::ContextCanceled)));
        assert_eq!(seen, 2);
    }
}
