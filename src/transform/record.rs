//! Conversion of a single record into an OTLP metric.

use crate::core::{Result, TransformError};
use crate::metrics::{
    self, Aggregation, AggregationKind, Descriptor, Number, NumberKind, Record, Temporality,
    TemporalitySelector,
};
use crate::transform::value::key_values;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, summary_data_point::ValueAtQuantile, AggregationTemporality,
    Gauge, Histogram, HistogramDataPoint, Metric, NumberDataPoint, Sum, Summary, SummaryDataPoint,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the UNIX epoch; times at or before the epoch are 0.
pub fn to_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Converts a record into an OTLP metric.
///
/// `Ok(None)` means the record legitimately produced nothing, such as a
/// points aggregation without samples.
pub fn record(selector: &dyn TemporalitySelector, record: &Record) -> Result<Option<Metric>> {
    let declared = record.aggregation_kind();
    let aggregation = record.aggregation();
    let incompatible = || TransformError::IncompatibleAggregation {
        declared: declared.clone(),
        found: aggregation.kind(),
    };

    match declared {
        AggregationKind::MinMaxSumCount => {
            let Aggregation::MinMaxSumCount(mmsc) = aggregation else {
                return Err(incompatible());
            };
            min_max_sum_count(record, mmsc).map(Some)
        },
        AggregationKind::Histogram => {
            let Aggregation::Histogram(h) = aggregation else {
                return Err(incompatible());
            };
            let temporality =
                selector.temporality_for(record.descriptor(), &AggregationKind::Histogram);
            histogram_point(record, temporality, h).map(Some)
        },
        AggregationKind::Sum => {
            let Aggregation::Sum(s) = aggregation else {
                return Err(incompatible());
            };
            let value = s.sum()?;
            let temporality = selector.temporality_for(record.descriptor(), &AggregationKind::Sum);
            let monotonic = record.descriptor().instrument_kind().monotonic();
            sum_point(record, value, temporality, monotonic).map(Some)
        },
        AggregationKind::LastValue => {
            let Aggregation::LastValue(lv) = aggregation else {
                return Err(incompatible());
            };
            let (value, observed_at) = lv.last_value()?;
            // The observation time is the point; there is no interval.
            gauge_point(record, value, None, observed_at).map(Some)
        },
        AggregationKind::Points => {
            let Aggregation::Points(p) = aggregation else {
                return Err(incompatible());
            };
            gauge_array(record, p.points())
        },
        AggregationKind::Other(_) => Err(TransformError::UnimplementedAggregation(declared.clone())),
    }
}

fn number_value(kind: NumberKind, n: Number) -> Result<number_data_point::Value> {
    match kind {
        NumberKind::Int64 => Ok(number_data_point::Value::AsInt(n.as_i64())),
        NumberKind::Float64 => Ok(number_data_point::Value::AsDouble(n.as_f64())),
        NumberKind::Unspecified => Err(TransformError::UnknownValueType(kind)),
    }
}

fn coerce_to_f64(kind: NumberKind, n: Number) -> Result<f64> {
    match kind {
        NumberKind::Int64 => Ok(n.as_i64() as f64),
        NumberKind::Float64 => Ok(n.as_f64()),
        NumberKind::Unspecified => Err(TransformError::UnknownValueType(kind)),
    }
}

fn metric(desc: &Descriptor, data: Data) -> Metric {
    Metric {
        name: desc.name().to_string(),
        description: desc.description().to_string(),
        unit: desc.unit().to_string(),
        data: Some(data),
        ..Default::default()
    }
}

fn wire_temporality(t: Temporality) -> i32 {
    AggregationTemporality::from(t) as i32
}

fn gauge_array(record: &Record, points: &[Number]) -> Result<Option<Metric>> {
    if points.is_empty() {
        return Ok(None);
    }
    let desc = record.descriptor();
    let attributes = key_values(record.attributes());

    let data_points = points
        .iter()
        .map(|p| {
            Ok(NumberDataPoint {
                attributes: attributes.clone(),
                start_time_unix_nano: to_nanos(record.start_time()),
                time_unix_nano: to_nanos(record.end_time()),
                value: Some(number_value(desc.number_kind(), *p)?),
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(metric(desc, Data::Gauge(Gauge { data_points }))))
}

fn gauge_point(
    record: &Record,
    value: Number,
    start: Option<SystemTime>,
    end: SystemTime,
) -> Result<Metric> {
    let desc = record.descriptor();
    let point = NumberDataPoint {
        attributes: key_values(record.attributes()),
        start_time_unix_nano: start.map_or(0, to_nanos),
        time_unix_nano: to_nanos(end),
        value: Some(number_value(desc.number_kind(), value)?),
        ..Default::default()
    };
    Ok(metric(
        desc,
        Data::Gauge(Gauge {
            data_points: vec![point],
        }),
    ))
}

fn sum_point(
    record: &Record,
    value: Number,
    temporality: Temporality,
    monotonic: bool,
) -> Result<Metric> {
    let desc = record.descriptor();
    let point = NumberDataPoint {
        attributes: key_values(record.attributes()),
        start_time_unix_nano: to_nanos(record.start_time()),
        time_unix_nano: to_nanos(record.end_time()),
        value: Some(number_value(desc.number_kind(), value)?),
        ..Default::default()
    };
    Ok(metric(
        desc,
        Data::Sum(Sum {
            data_points: vec![point],
            aggregation_temporality: wire_temporality(temporality),
            is_monotonic: monotonic,
        }),
    ))
}

/// Min and max are reported as the 0th and 100th quantiles of a summary.
/// This is an approximation of a real summary that downstream consumers
/// rely on, so it stays as is.
fn min_max_sum_count(record: &Record, mmsc: &metrics::MinMaxSumCount) -> Result<Metric> {
    let desc = record.descriptor();
    let kind = desc.number_kind();
    let min = mmsc.min()?;
    let max = mmsc.max()?;
    let sum = mmsc.sum();
    let count = mmsc.count();

    let point = SummaryDataPoint {
        attributes: key_values(record.attributes()),
        start_time_unix_nano: to_nanos(record.start_time()),
        time_unix_nano: to_nanos(record.end_time()),
        count,
        sum: coerce_to_f64(kind, sum)?,
        quantile_values: vec![
            ValueAtQuantile {
                quantile: 0.0,
                value: coerce_to_f64(kind, min)?,
            },
            ValueAtQuantile {
                quantile: 1.0,
                value: coerce_to_f64(kind, max)?,
            },
        ],
        ..Default::default()
    };
    Ok(metric(
        desc,
        Data::Summary(Summary {
            data_points: vec![point],
        }),
    ))
}

fn histogram_point(
    record: &Record,
    temporality: Temporality,
    h: &metrics::Histogram,
) -> Result<Metric> {
    let desc = record.descriptor();
    let (boundaries, counts) = (h.boundaries(), h.counts());
    if counts.len() != boundaries.len() + 1 {
        return Err(TransformError::TransformFailed(format!(
            "histogram {} has {} bucket counts for {} boundaries",
            desc.name(),
            counts.len(),
            boundaries.len()
        )));
    }

    let point = HistogramDataPoint {
        attributes: key_values(record.attributes()),
        start_time_unix_nano: to_nanos(record.start_time()),
        time_unix_nano: to_nanos(record.end_time()),
        count: h.count(),
        sum: Some(coerce_to_f64(desc.number_kind(), h.sum())?),
        bucket_counts: counts.to_vec(),
        explicit_bounds: boundaries.to_vec(),
        ..Default::default()
    };
    Ok(metric(
        desc,
        Data::Histogram(Histogram {
            data_points: vec![point],
            aggregation_temporality: wire_temporality(temporality),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        AggregationError, AttributeSet, CumulativeSelector, DeltaSelector, InstrumentKind,
        InstrumentationScope, LastValue, MinMaxSumCount, Points, Resource, StatelessSelector,
    };
    use opentelemetry::KeyValue;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn end() -> SystemTime {
        start() + Duration::from_secs(60)
    }

    fn test_record(
        instrument: InstrumentKind,
        number: NumberKind,
        aggregation: impl Into<Aggregation>,
    ) -> Record {
        Record::new(
            Arc::new(
                Descriptor::new("requests", instrument, number)
                    .with_description("handled requests")
                    .with_unit("1"),
            ),
            AttributeSet::new(vec![KeyValue::new("route", "/pay")]),
            Arc::new(Resource::new(vec![KeyValue::new("service.name", "checkout")])),
            InstrumentationScope::new("io.checkout"),
            aggregation.into(),
            start(),
            end(),
        )
    }

    fn number_points(metric: &Metric) -> &[NumberDataPoint] {
        match metric.data.as_ref() {
            Some(Data::Gauge(g)) => &g.data_points,
            Some(Data::Sum(s)) => &s.data_points,
            other => panic!("Expected number points, got {:?}", other),
        }
    }

    #[test]
    fn test_min_max_sum_count_to_summary() {
        let mmsc = MinMaxSumCount::new(Number::Int(1), Number::Int(9), Number::Int(20), 4);
        let r = test_record(InstrumentKind::Histogram, NumberKind::Int64, mmsc);

        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();
        assert_eq!(metric.name, "requests");
        assert_eq!(metric.description, "handled requests");
        assert_eq!(metric.unit, "1");

        let Some(Data::Summary(summary)) = metric.data else {
            panic!("Expected summary");
        };
        assert_eq!(summary.data_points.len(), 1);
        let point = &summary.data_points[0];
        assert_eq!(point.sum, 20.0);
        assert_eq!(point.count, 4);
        assert_eq!(
            point.quantile_values,
            vec![
                ValueAtQuantile {
                    quantile: 0.0,
                    value: 1.0
                },
                ValueAtQuantile {
                    quantile: 1.0,
                    value: 9.0
                },
            ]
        );
        assert_eq!(point.start_time_unix_nano, to_nanos(start()));
        assert_eq!(point.time_unix_nano, to_nanos(end()));
    }

    #[test]
    fn test_min_max_sum_count_without_data() {
        let r = test_record(InstrumentKind::Histogram, NumberKind::Int64, MinMaxSumCount::empty());
        let err = record(&CumulativeSelector, &r).unwrap_err();
        assert!(matches!(err, TransformError::Aggregation(AggregationError::NoData)));
    }

    #[test]
    fn test_histogram_point() {
        let h = metrics::Histogram::new(vec![10.0, 50.0], vec![3, 4, 1], Number::Float(212.5), 8);
        let r = test_record(InstrumentKind::Histogram, NumberKind::Float64, h);

        let metric = record(&DeltaSelector, &r).unwrap().unwrap();
        let Some(Data::Histogram(hist)) = metric.data else {
            panic!("Expected histogram");
        };
        assert_eq!(hist.aggregation_temporality, AggregationTemporality::Delta as i32);
        let point = &hist.data_points[0];
        assert_eq!(point.sum, Some(212.5));
        assert_eq!(point.count, 8);
        assert_eq!(point.bucket_counts, vec![3, 4, 1]);
        assert_eq!(point.explicit_bounds, vec![10.0, 50.0]);
        assert_eq!(point.attributes.len(), 1);
    }

    #[test]
    fn test_histogram_bucket_mismatch() {
        for counts in [vec![1, 2], vec![1, 2, 3, 4], Vec::new()] {
            let h = metrics::Histogram::new(vec![10.0, 50.0], counts, Number::Float(1.0), 1);
            let r = test_record(InstrumentKind::Histogram, NumberKind::Float64, h);
            let err = record(&CumulativeSelector, &r).unwrap_err();
            assert!(matches!(err, TransformError::TransformFailed(_)));
            assert!(err.is_transform_failed());
        }
    }

    #[test]
    fn test_sum_int_populates_only_as_int() {
        let r = test_record(InstrumentKind::Counter, NumberKind::Int64, metrics::Sum::new(5.7));
        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();

        let Some(Data::Sum(sum)) = metric.data.as_ref() else {
            panic!("Expected sum");
        };
        assert!(sum.is_monotonic);
        assert_eq!(sum.aggregation_temporality, AggregationTemporality::Cumulative as i32);
        assert_eq!(
            number_points(&metric)[0].value,
            Some(number_data_point::Value::AsInt(5))
        );
    }

    #[test]
    fn test_sum_float_populates_only_as_double() {
        let r = test_record(
            InstrumentKind::UpDownCounter,
            NumberKind::Float64,
            metrics::Sum::new(7_i64),
        );
        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();

        let Some(Data::Sum(sum)) = metric.data.as_ref() else {
            panic!("Expected sum");
        };
        assert!(!sum.is_monotonic);
        assert_eq!(
            number_points(&metric)[0].value,
            Some(number_data_point::Value::AsDouble(7.0))
        );
    }

    #[test]
    fn test_sum_temporality_from_selector() {
        let r = test_record(
            InstrumentKind::CounterObserver,
            NumberKind::Int64,
            metrics::Sum::new(3_i64),
        );
        let metric = record(&StatelessSelector, &r).unwrap().unwrap();
        let Some(Data::Sum(sum)) = metric.data else {
            panic!("Expected sum");
        };
        assert_eq!(sum.aggregation_temporality, AggregationTemporality::Cumulative as i32);
    }

    #[test]
    fn test_sum_without_data() {
        let r = test_record(InstrumentKind::Counter, NumberKind::Int64, metrics::Sum::empty());
        let err = record(&CumulativeSelector, &r).unwrap_err();
        assert!(matches!(err, TransformError::Aggregation(AggregationError::NoData)));
    }

    #[test]
    fn test_last_value_discards_start() {
        let observed = start() + Duration::from_secs(42);
        let r = test_record(
            InstrumentKind::GaugeObserver,
            NumberKind::Float64,
            LastValue::new(0.75, observed),
        );
        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();

        assert!(matches!(metric.data, Some(Data::Gauge(_))));
        let point = &number_points(&metric)[0];
        assert_eq!(point.start_time_unix_nano, 0);
        assert_eq!(point.time_unix_nano, to_nanos(observed));
        assert_eq!(point.value, Some(number_data_point::Value::AsDouble(0.75)));
    }

    #[test]
    fn test_last_value_without_data() {
        let r = test_record(InstrumentKind::GaugeObserver, NumberKind::Float64, LastValue::empty());
        assert!(matches!(
            record(&CumulativeSelector, &r),
            Err(TransformError::Aggregation(AggregationError::NoData))
        ));
    }

    #[test]
    fn test_points_to_gauge() {
        let samples = vec![Number::Int(3), Number::Float(4.9), Number::Int(-1)];
        let r = test_record(InstrumentKind::Histogram, NumberKind::Int64, Points::new(samples));
        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();

        let points = number_points(&metric);
        assert_eq!(points.len(), 3);
        let values: Vec<_> = points.iter().map(|p| p.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                Some(number_data_point::Value::AsInt(3)),
                Some(number_data_point::Value::AsInt(4)),
                Some(number_data_point::Value::AsInt(-1)),
            ]
        );
        for p in points {
            assert_eq!(p.start_time_unix_nano, to_nanos(start()));
            assert_eq!(p.time_unix_nano, to_nanos(end()));
            assert_eq!(p.attributes.len(), 1);
        }
    }

    #[test]
    fn test_empty_points_produce_nothing() {
        let r = test_record(InstrumentKind::Histogram, NumberKind::Int64, Points::default());
        assert_eq!(record(&CumulativeSelector, &r).unwrap(), None);
    }

    #[test]
    fn test_unimplemented_aggregation() {
        let r = test_record(InstrumentKind::Histogram, NumberKind::Float64, Points::default())
            .with_declared_kind(AggregationKind::other("exponential_histogram"));
        let err = record(&CumulativeSelector, &r).unwrap_err();
        assert!(matches!(err, TransformError::UnimplementedAggregation(_)));
        assert_eq!(err.to_string(), "unimplemented aggregator: exponential_histogram");
    }

    #[test]
    fn test_incompatible_aggregation() {
        let r = test_record(InstrumentKind::Counter, NumberKind::Int64, metrics::Sum::new(1_i64))
            .with_declared_kind(AggregationKind::Histogram);
        let err = record(&CumulativeSelector, &r).unwrap_err();
        match err {
            TransformError::IncompatibleAggregation { declared, found } => {
                assert_eq!(declared, AggregationKind::Histogram);
                assert_eq!(found, AggregationKind::Sum);
            },
            other => panic!("Expected incompatible aggregation, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_value_type_in_every_branch() {
        let aggregations: Vec<Aggregation> = vec![
            MinMaxSumCount::new(Number::Int(1), Number::Int(2), Number::Int(3), 2).into(),
            metrics::Histogram::new(vec![1.0], vec![1, 1], Number::Int(3), 2).into(),
            metrics::Sum::new(1_i64).into(),
            LastValue::new(1_i64, end()).into(),
            Points::new(vec![Number::Int(1)]).into(),
        ];
        for aggregation in aggregations {
            let r = test_record(InstrumentKind::Counter, NumberKind::Unspecified, aggregation);
            let err = record(&CumulativeSelector, &r).unwrap_err();
            assert!(
                matches!(err, TransformError::UnknownValueType(NumberKind::Unspecified)),
                "unexpected error {:?}",
                err
            );
        }
    }

    #[test]
    fn test_empty_attributes_encode_to_empty_list() {
        let r = Record::new(
            Arc::new(Descriptor::new("up", InstrumentKind::GaugeObserver, NumberKind::Int64)),
            AttributeSet::empty(),
            Arc::new(Resource::empty()),
            InstrumentationScope::default(),
            LastValue::new(1_i64, end()).into(),
            start(),
            end(),
        );
        let metric = record(&CumulativeSelector, &r).unwrap().unwrap();
        assert!(number_points(&metric)[0].attributes.is_empty());
    }

    #[test]
    fn test_to_nanos() {
        assert_eq!(to_nanos(UNIX_EPOCH), 0);
        assert_eq!(to_nanos(UNIX_EPOCH - Duration::from_secs(1)), 0);
        assert_eq!(to_nanos(UNIX_EPOCH + Duration::from_nanos(1_500)), 1_500);
    }
}
