// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Helpers over OTLP metric pdata: attribute canonicalization and a
//! kind-agnostic view of a metric's data points as numeric rows.
//!
//! Gauges and sums contribute one scalar per data point. Histogram-shaped
//! kinds are flattened to an FP64 vector per data point with a fixed layout:
//! `[count, sum, bucket_counts…]` for histograms, `[count, sum, quantile
//! values…]` for summaries and `[count, sum, zero_count, positive bucket
//! counts…]` for exponential histograms.

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{Metric, metric, number_data_point};

/// A numeric value carried by a data point, preserving the int/float tag of
/// the wire representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointValue {
    /// An integer-valued sample.
    Int(i64),
    /// A floating-point sample.
    Double(f64),
}

impl PointValue {
    /// Widens the value to `f64` (the request tensor element type).
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            PointValue::Int(v) => v as f64,
            PointValue::Double(v) => v,
        }
    }

    /// True when the value is integer-tagged.
    #[must_use]
    pub fn is_int(&self) -> bool {
        matches!(self, PointValue::Int(_))
    }
}

/// One data point of any metric kind, reduced to its attributes, timestamp
/// and numeric content.
#[derive(Debug, Clone)]
pub struct NumericPoint {
    /// The data point attributes, in wire order.
    pub attributes: Vec<KeyValue>,
    /// Sample timestamp in unix nanoseconds.
    pub time_unix_nano: u64,
    /// Numeric content. Length 1 for gauges and sums; the flattened layout
    /// documented on this module for histogram-shaped kinds.
    pub values: Vec<PointValue>,
}

impl NumericPoint {
    /// The canonical attribute key of this point (see [`canonical_attr_key`]).
    #[must_use]
    pub fn canonical_key(&self) -> String {
        canonical_attr_key(&self.attributes)
    }
}

/// Renders an attribute value as the string used for selector comparison and
/// output attribute copying.
#[must_use]
pub fn attr_value_string(value: &AnyValue) -> String {
    match value.value.as_ref() {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::ArrayValue(a)) => {
            let items: Vec<String> = a.values.iter().map(attr_value_string).collect();
            format!("[{}]", items.join(","))
        }
        Some(any_value::Value::KvlistValue(kv)) => {
            let items: Vec<String> = kv
                .values
                .iter()
                .map(|kv| {
                    let v = kv.value.as_ref().map(attr_value_string).unwrap_or_default();
                    format!("{}={}", kv.key, v)
                })
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Some(any_value::Value::BytesValue(b)) => format!("{b:02x?}"),
        None => String::new(),
    }
}

/// The canonical key of an attribute set: the lexicographically sorted
/// `key=value` pairs joined by commas. Two data points belong to the same
/// partition iff their canonical keys are equal, and the sorted key order is
/// also the emission order of aligned groups.
#[must_use]
pub fn canonical_attr_key(attributes: &[KeyValue]) -> String {
    let mut pairs: Vec<String> = attributes
        .iter()
        .map(|kv| {
            let value = kv.value.as_ref().map(attr_value_string).unwrap_or_default();
            format!("{}={}", kv.key, value)
        })
        .collect();
    pairs.sort_unstable();
    pairs.join(",")
}

/// Extracts the numeric rows of a metric, one per data point, regardless of
/// the metric kind. Unset number values decay to `Int(0)`, matching the
/// proto3 default.
#[must_use]
pub fn extract_points(metric: &Metric) -> Vec<NumericPoint> {
    match metric.data.as_ref() {
        Some(metric::Data::Gauge(gauge)) => gauge
            .data_points
            .iter()
            .map(|dp| NumericPoint {
                attributes: dp.attributes.clone(),
                time_unix_nano: dp.time_unix_nano,
                values: vec![number_value(dp.value.as_ref())],
            })
            .collect(),
        Some(metric::Data::Sum(sum)) => sum
            .data_points
            .iter()
            .map(|dp| NumericPoint {
                attributes: dp.attributes.clone(),
                time_unix_nano: dp.time_unix_nano,
                values: vec![number_value(dp.value.as_ref())],
            })
            .collect(),
        Some(metric::Data::Histogram(histogram)) => histogram
            .data_points
            .iter()
            .map(|dp| {
                let mut values = Vec::with_capacity(2 + dp.bucket_counts.len());
                values.push(PointValue::Double(dp.count as f64));
                values.push(PointValue::Double(dp.sum.unwrap_or(0.0)));
                values.extend(dp.bucket_counts.iter().map(|c| PointValue::Double(*c as f64)));
                NumericPoint {
                    attributes: dp.attributes.clone(),
                    time_unix_nano: dp.time_unix_nano,
                    values,
                }
            })
            .collect(),
        Some(metric::Data::Summary(summary)) => summary
            .data_points
            .iter()
            .map(|dp| {
                let mut values = Vec::with_capacity(2 + dp.quantile_values.len());
                values.push(PointValue::Double(dp.count as f64));
                values.push(PointValue::Double(dp.sum));
                values.extend(
                    dp.quantile_values
                        .iter()
                        .map(|q| PointValue::Double(q.value)),
                );
                NumericPoint {
                    attributes: dp.attributes.clone(),
                    time_unix_nano: dp.time_unix_nano,
                    values,
                }
            })
            .collect(),
        Some(metric::Data::ExponentialHistogram(histogram)) => histogram
            .data_points
            .iter()
            .map(|dp| {
                let positive = dp
                    .positive
                    .as_ref()
                    .map(|b| b.bucket_counts.as_slice())
                    .unwrap_or(&[]);
                let mut values = Vec::with_capacity(3 + positive.len());
                values.push(PointValue::Double(dp.count as f64));
                values.push(PointValue::Double(dp.sum.unwrap_or(0.0)));
                values.push(PointValue::Double(dp.zero_count as f64));
                values.extend(positive.iter().map(|c| PointValue::Double(*c as f64)));
                NumericPoint {
                    attributes: dp.attributes.clone(),
                    time_unix_nano: dp.time_unix_nano,
                    values,
                }
            })
            .collect(),
        None => Vec::new(),
    }
}

fn number_value(value: Option<&number_data_point::Value>) -> PointValue {
    match value {
        Some(number_data_point::Value::AsDouble(v)) => PointValue::Double(*v),
        Some(number_data_point::Value::AsInt(v)) => PointValue::Int(*v),
        None => PointValue::Int(0),
    }
}
