// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The output synthesizer: decoded values become a new gauge metric placed
//! in the scope of the rule's primary input.
//!
//! Every output data point carries every attribute of every contributing
//! input data point, namespaced as `<inputMetricName>.<attrKey>` to avoid
//! collisions between inputs that share attribute names, plus the
//! provenance labels identifying the producing model.

use crate::matcher::PointGroup;
use crate::pdata::{PointValue, attr_value_string};
use crate::rules::{CompiledRule, OutputSpec};
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Metric, NumberDataPoint, ScopeMetrics, metric, number_data_point,
};

/// Provenance label recording the producing model's name.
pub const MODEL_NAME_LABEL: &str = "otel.inference.model.name";

/// Provenance label recording the producing model's version, attached only
/// when the rule pins one.
pub const MODEL_VERSION_LABEL: &str = "otel.inference.model.version";

/// Appends one output metric to `scope`, with one data point per aligned
/// group. `values` must be parallel to `groups` (the caller enforces the
/// count invariant before getting here).
pub fn synthesize_output(
    scope: &mut ScopeMetrics,
    rule: &CompiledRule,
    output: &OutputSpec,
    groups: &[PointGroup],
    values: &[PointValue],
    timestamp_unix_nano: u64,
) {
    let description = output.description.clone().unwrap_or_else(|| {
        format!("Inference result from model {}", rule.model_name)
    });

    let data_points = groups
        .iter()
        .zip(values)
        .map(|(group, value)| NumberDataPoint {
            attributes: output_attributes(rule, group),
            time_unix_nano: timestamp_unix_nano,
            value: Some(match value {
                PointValue::Int(i) => number_data_point::Value::AsInt(*i),
                PointValue::Double(d) => number_data_point::Value::AsDouble(*d),
            }),
            ..Default::default()
        })
        .collect();

    scope.metrics.push(Metric {
        name: output.name.clone(),
        description,
        unit: output.unit.clone().unwrap_or_default(),
        data: Some(metric::Data::Gauge(Gauge { data_points })),
        ..Default::default()
    });
}

/// Builds the attribute set of one output data point: namespaced copies of
/// every contributing input attribute, then the provenance labels. No other
/// attributes are attached, to keep series cardinality bounded.
fn output_attributes(rule: &CompiledRule, group: &PointGroup) -> Vec<KeyValue> {
    let mut attributes = Vec::new();
    for (input_name, point) in rule.inputs.iter().zip(&group.points) {
        for attr in &point.attributes {
            let value = attr.value.as_ref().map(attr_value_string).unwrap_or_default();
            attributes.push(string_attr(
                format!("{input_name}.{}", attr.key),
                value,
            ));
        }
    }
    attributes.push(string_attr(
        MODEL_NAME_LABEL.to_string(),
        rule.model_name.clone(),
    ));
    if let Some(version) = &rule.model_version {
        attributes.push(string_attr(MODEL_VERSION_LABEL.to_string(), version.clone()));
    }
    attributes
}

fn string_attr(key: String, value: String) -> KeyValue {
    KeyValue {
        key,
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value)),
        }),
    }
}
