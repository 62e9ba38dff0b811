// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared builders for unit tests.

use crate::pdata::{NumericPoint, PointValue};
use crate::processor::MetricsConsumer;
use async_trait::async_trait;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Histogram, HistogramDataPoint, Metric, MetricsData, NumberDataPoint, ResourceMetrics,
    ScopeMetrics, metric, number_data_point,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub fn attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

/// Flattens an attribute list into a string map for assertions.
pub fn attr_map(attributes: &[KeyValue]) -> BTreeMap<String, String> {
    attributes
        .iter()
        .map(|kv| {
            let value = kv
                .value
                .as_ref()
                .map(crate::pdata::attr_value_string)
                .unwrap_or_default();
            (kv.key.clone(), value)
        })
        .collect()
}

pub fn point(value: f64) -> NumericPoint {
    point_with_attrs(value, vec![])
}

pub fn point_int(value: i64) -> NumericPoint {
    NumericPoint {
        attributes: vec![],
        time_unix_nano: 0,
        values: vec![PointValue::Int(value)],
    }
}

pub fn point_with_attrs(value: f64, attributes: Vec<KeyValue>) -> NumericPoint {
    NumericPoint {
        attributes,
        time_unix_nano: 0,
        values: vec![PointValue::Double(value)],
    }
}

/// A gauge metric with one data point per `(attributes, value)` entry.
pub fn gauge_metric(name: &str, points: Vec<(Vec<KeyValue>, PointValue)>) -> Metric {
    let data_points = points
        .into_iter()
        .map(|(attributes, value)| NumberDataPoint {
            attributes,
            time_unix_nano: 1_700_000_000_000_000_000,
            value: Some(match value {
                PointValue::Int(i) => number_data_point::Value::AsInt(i),
                PointValue::Double(d) => number_data_point::Value::AsDouble(d),
            }),
            ..Default::default()
        })
        .collect();
    Metric {
        name: name.to_string(),
        data: Some(metric::Data::Gauge(Gauge { data_points })),
        ..Default::default()
    }
}

/// A histogram metric with a single attribute-less data point.
pub fn histogram_metric(name: &str, count: u64, sum: f64, buckets: Vec<u64>) -> Metric {
    Metric {
        name: name.to_string(),
        data: Some(metric::Data::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                count,
                sum: Some(sum),
                bucket_counts: buckets,
                time_unix_nano: 1_700_000_000_000_000_000,
                ..Default::default()
            }],
            aggregation_temporality: 2,
        })),
        ..Default::default()
    }
}

/// A one-resource, one-scope batch holding the given metrics.
pub fn batch_with(metrics: Vec<Metric>) -> MetricsData {
    MetricsData {
        resource_metrics: vec![ResourceMetrics {
            scope_metrics: vec![ScopeMetrics {
                metrics,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// A downstream consumer that records every batch it receives.
#[derive(Default)]
pub struct CapturingConsumer {
    batches: Mutex<Vec<MetricsData>>,
}

impl CapturingConsumer {
    pub fn batches(&self) -> Vec<MetricsData> {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MetricsConsumer for CapturingConsumer {
    async fn consume_metrics(&self, batch: MetricsData) {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(batch);
    }
}
