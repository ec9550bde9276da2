use crate::metrics::{
    Aggregation, AggregationKind, AttributeSet, Descriptor, InstrumentationScope, Resource,
};
use std::sync::Arc;
use std::time::SystemTime;

/// One aggregation result for an instrument and attribute set over the
/// checkpoint interval
#[derive(Debug, Clone)]
pub struct Record {
    descriptor: Arc<Descriptor>,
    attributes: AttributeSet,
    resource: Arc<Resource>,
    scope: InstrumentationScope,
    kind: AggregationKind,
    aggregation: Aggregation,
    start_time: SystemTime,
    end_time: SystemTime,
}

impl Record {
    /// Creates a record whose declared kind is the payload's own kind.
    pub fn new(
        descriptor: Arc<Descriptor>,
        attributes: AttributeSet,
        resource: Arc<Resource>,
        scope: InstrumentationScope,
        aggregation: Aggregation,
        start_time: SystemTime,
        end_time: SystemTime,
    ) -> Self {
        Self {
            descriptor,
            attributes,
            resource,
            scope,
            kind: aggregation.kind(),
            aggregation,
            start_time,
            end_time,
        }
    }

    /// Overrides the declared aggregation kind, for aggregators that report
    /// a kind independently of the payload they hand over.
    pub fn with_declared_kind(mut self, kind: AggregationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Kind declared by the aggregator
    pub fn aggregation_kind(&self) -> &AggregationKind {
        &self.kind
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }
}
