//! Attribute and value encoding into OTLP common types.

use crate::metrics::{AttributeSet, InstrumentationScope, Resource};
use opentelemetry::{Array, Value};
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, InstrumentationScope as ProtoScope, KeyValue as ProtoKeyValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;

/// Encodes an attribute set. An empty set encodes to an empty list.
pub fn key_values(attributes: &AttributeSet) -> Vec<ProtoKeyValue> {
    if attributes.is_empty() {
        return Vec::new();
    }
    attributes
        .iter()
        .map(|kv| ProtoKeyValue {
            key: kv.key.as_str().to_string(),
            value: Some(value(&kv.value)),
        })
        .collect()
}

/// Encodes a single attribute value.
pub fn value(v: &Value) -> AnyValue {
    #[allow(unreachable_patterns)]
    let encoded = match v {
        Value::Bool(b) => any_value::Value::BoolValue(*b),
        Value::I64(i) => any_value::Value::IntValue(*i),
        Value::F64(f) => any_value::Value::DoubleValue(*f),
        Value::Array(arr) => any_value::Value::ArrayValue(ArrayValue {
            values: array_values(arr),
        }),
        // Strings, and any scalar added later, travel as their string form.
        other => any_value::Value::StringValue(other.as_str().into_owned()),
    };
    AnyValue {
        value: Some(encoded),
    }
}

/// Element-wise encoding of a homogeneous array. Element types without an
/// encoding yield an empty list rather than an error.
#[allow(unreachable_patterns)]
fn array_values(arr: &Array) -> Vec<AnyValue> {
    let wrap = |v| AnyValue { value: Some(v) };
    match arr {
        Array::Bool(vals) => vals
            .iter()
            .map(|b| wrap(any_value::Value::BoolValue(*b)))
            .collect(),
        Array::I64(vals) => vals
            .iter()
            .map(|i| wrap(any_value::Value::IntValue(*i)))
            .collect(),
        Array::F64(vals) => vals
            .iter()
            .map(|f| wrap(any_value::Value::DoubleValue(*f)))
            .collect(),
        Array::String(vals) => vals
            .iter()
            .map(|s| wrap(any_value::Value::StringValue(s.as_str().to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

/// Encodes a resource with its attributes.
pub fn resource(resource: &Resource) -> ProtoResource {
    ProtoResource {
        attributes: key_values(resource.attributes()),
        ..Default::default()
    }
}

/// Encodes a scope; the empty scope has no wire representation.
pub fn scope(scope: &InstrumentationScope) -> Option<ProtoScope> {
    if scope.is_empty() {
        return None;
    }
    Some(ProtoScope {
        name: scope.name.clone(),
        version: scope.version.clone(),
        ..Default::default()
    })
}
