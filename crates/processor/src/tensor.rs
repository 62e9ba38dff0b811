// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Tensor codec: aligned groups in, `ModelInferRequest` out; response
//! tensors in, typed data-point values out.
//!
//! Requests always carry FP64 tensors, one per rule input, named after the
//! input metric. Integer samples are widened to `f64`. Tensor values are
//! emitted in group order, which equals the matcher's canonical-key order.

use crate::config::{DataType, ParamValue};
use crate::matcher::PointGroup;
use crate::metadata::ElementType;
use crate::pdata::PointValue;
use crate::rules::CompiledRule;
use otel_infer_kserve::inference::{
    InferParameter, InferTensorContents, ModelInferRequest, ModelInferResponse,
    infer_parameter::ParameterChoice,
    model_infer_request::InferInputTensor,
    model_infer_response::InferOutputTensor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide sequence number folded into request ids so two calls in the
/// same nanosecond stay distinguishable.
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a unique request id from wall-clock nanos and a process-wide
/// counter.
#[must_use]
pub fn next_request_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{nanos}-{sequence}")
}

/// Encodes the aligned groups of a rule into an inference request.
///
/// Each input yields one FP64 tensor whose contents are the per-group
/// samples in group order. When every group contributes exactly one sample
/// the shape is `[K]`; flattened histogram-shaped inputs concatenate their
/// vectors and declare the total length.
#[must_use]
pub fn encode_request(rule: &CompiledRule, groups: &[PointGroup]) -> ModelInferRequest {
    let mut inputs = Vec::with_capacity(rule.inputs.len());
    for (index, input_name) in rule.inputs.iter().enumerate() {
        let mut contents: Vec<f64> = Vec::with_capacity(groups.len());
        let mut scalar_groups = true;
        for group in groups {
            let values = &group.points[index].values;
            if values.len() != 1 {
                scalar_groups = false;
            }
            contents.extend(values.iter().map(PointValue::as_f64));
        }
        let shape = if scalar_groups {
            vec![groups.len() as i64]
        } else {
            vec![contents.len() as i64]
        };
        inputs.push(InferInputTensor {
            name: input_name.clone(),
            datatype: "FP64".to_string(),
            shape,
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                fp64_contents: contents,
                ..Default::default()
            }),
        });
    }

    ModelInferRequest {
        model_name: rule.model_name.clone(),
        model_version: rule.model_version.clone().unwrap_or_default(),
        id: next_request_id(),
        parameters: encode_parameters(&rule.parameters),
        inputs,
        outputs: Vec::new(),
        raw_input_contents: Vec::new(),
    }
}

/// Maps rule parameters onto the protocol's typed scalars. The protocol has
/// no float parameter type; floats travel as their decimal string.
fn encode_parameters(
    parameters: &std::collections::BTreeMap<String, ParamValue>,
) -> HashMap<String, InferParameter> {
    parameters
        .iter()
        .map(|(name, value)| {
            let choice = match value {
                ParamValue::Bool(b) => ParameterChoice::BoolParam(*b),
                ParamValue::Int(i) => ParameterChoice::Int64Param(*i),
                ParamValue::Float(f) => ParameterChoice::StringParam(f.to_string()),
                ParamValue::String(s) => ParameterChoice::StringParam(s.clone()),
            };
            (
                name.clone(),
                InferParameter {
                    parameter_choice: Some(choice),
                },
            )
        })
        .collect()
}

/// Selects the response tensor for an output spec: by `output_index` when
/// configured, else by position. `None` means the index was out of range
/// (logged by the caller as a response-shape problem).
#[must_use]
pub fn select_output_tensor<'a>(
    response: &'a ModelInferResponse,
    position: usize,
    output_index: Option<usize>,
) -> Option<&'a InferOutputTensor> {
    match output_index {
        Some(index) => response.outputs.get(index),
        None => response.outputs.get(position),
    }
}

/// Decodes a response tensor into per-group data-point values.
///
/// The configured data type wins when present; otherwise the type is
/// inferred from the tensor dtype. Returns `None` when the values are not
/// metricizable (BYTES/string outputs, which are logged instead).
#[must_use]
pub fn decode_output(tensor: &InferOutputTensor, configured: Option<DataType>) -> Option<Vec<PointValue>> {
    let dtype = ElementType::parse(&tensor.datatype);
    let contents = tensor.contents.as_ref();

    let raw: Vec<PointValue> = match &dtype {
        ElementType::Fp64 => contents
            .map(|c| c.fp64_contents.iter().map(|v| PointValue::Double(*v)).collect())
            .unwrap_or_default(),
        ElementType::Fp32 => contents
            .map(|c| {
                c.fp32_contents
                    .iter()
                    .map(|v| PointValue::Double(f64::from(*v)))
                    .collect()
            })
            .unwrap_or_default(),
        ElementType::Int8 | ElementType::Int16 | ElementType::Int32 => contents
            .map(|c| {
                c.int_contents
                    .iter()
                    .map(|v| PointValue::Int(i64::from(*v)))
                    .collect()
            })
            .unwrap_or_default(),
        ElementType::Int64 => contents
            .map(|c| c.int64_contents.iter().map(|v| PointValue::Int(*v)).collect())
            .unwrap_or_default(),
        ElementType::Uint8 | ElementType::Uint16 | ElementType::Uint32 => contents
            .map(|c| {
                c.uint_contents
                    .iter()
                    .map(|v| PointValue::Int(i64::from(*v)))
                    .collect()
            })
            .unwrap_or_default(),
        ElementType::Uint64 => contents
            .map(|c| {
                c.uint64_contents
                    .iter()
                    .map(|v| PointValue::Int(*v as i64))
                    .collect()
            })
            .unwrap_or_default(),
        ElementType::Bool => contents
            .map(|c| {
                c.bool_contents
                    .iter()
                    .map(|v| PointValue::Int(i64::from(*v)))
                    .collect()
            })
            .unwrap_or_default(),
        ElementType::Bytes => {
            let strings: Vec<String> = contents
                .map(|c| {
                    c.bytes_contents
                        .iter()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .collect()
                })
                .unwrap_or_default();
            log::info!(
                "output tensor `{}` carries BYTES values, not metricized: {strings:?}",
                tensor.name
            );
            return None;
        }
        ElementType::Unknown(other) => {
            log::warn!(
                "output tensor `{}` has unknown dtype `{other}`; decoding as FP64",
                tensor.name
            );
            contents
                .map(|c| c.fp64_contents.iter().map(|v| PointValue::Double(*v)).collect())
                .unwrap_or_default()
        }
    };

    match configured {
        None => Some(raw),
        Some(DataType::Float) => Some(raw.iter().map(|v| PointValue::Double(v.as_f64())).collect()),
        Some(DataType::Int) => Some(
            raw.iter()
                .map(|v| match v {
                    PointValue::Int(i) => PointValue::Int(*i),
                    PointValue::Double(d) => PointValue::Int(*d as i64),
                })
                .collect(),
        ),
        Some(DataType::Bool) => Some(
            raw.iter()
                .map(|v| PointValue::Int(i64::from(v.as_f64() != 0.0)))
                .collect(),
        ),
        Some(DataType::String) => {
            log::info!(
                "output tensor `{}` configured as string, not metricized",
                tensor.name
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fixtures::{attr, point, point_with_attrs};
    use crate::matcher::align_groups;
    use crate::rules::compile_rules;

    fn rule() -> CompiledRule {
        let config = Config::from_value(&serde_json::json!({
            "grpc": { "endpoint": "http://localhost:1" },
            "rules": [{
                "model_name": "product",
                "model_version": "3",
                "inputs": ["mem.util", "mem.limit"],
                "parameters": { "scale": 1.5, "window": 5, "strict": true, "mode": "fast" }
            }]
        }))
        .unwrap();
        compile_rules(&config).unwrap().remove(0)
    }

    fn groups() -> Vec<PointGroup> {
        align_groups(&[
            (
                "mem.util".to_string(),
                vec![
                    point_with_attrs(0.5, vec![attr("state", "used")]),
                    point_with_attrs(0.3, vec![attr("state", "free")]),
                ],
            ),
            ("mem.limit".to_string(), vec![point(8e9)]),
        ])
    }

    #[test]
    fn encodes_one_fp64_tensor_per_input_in_group_order() {
        let request = encode_request(&rule(), &groups());

        assert_eq!(request.model_name, "product");
        assert_eq!(request.model_version, "3");
        assert!(!request.id.is_empty());
        assert_eq!(request.inputs.len(), 2);

        let util = &request.inputs[0];
        assert_eq!(util.name, "mem.util");
        assert_eq!(util.datatype, "FP64");
        assert_eq!(util.shape, vec![2]);
        // Canonical order: state=free before state=used.
        assert_eq!(
            util.contents.as_ref().unwrap().fp64_contents,
            vec![0.3, 0.5]
        );

        let limit = &request.inputs[1];
        assert_eq!(limit.shape, vec![2]);
        assert_eq!(
            limit.contents.as_ref().unwrap().fp64_contents,
            vec![8e9, 8e9]
        );
    }

    #[test]
    fn float_parameters_become_decimal_strings() {
        let request = encode_request(&rule(), &groups());
        let scale = &request.parameters["scale"];
        assert_eq!(
            scale.parameter_choice,
            Some(ParameterChoice::StringParam("1.5".to_string()))
        );
        assert_eq!(
            request.parameters["window"].parameter_choice,
            Some(ParameterChoice::Int64Param(5))
        );
        assert_eq!(
            request.parameters["strict"].parameter_choice,
            Some(ParameterChoice::BoolParam(true))
        );
        assert_eq!(
            request.parameters["mode"].parameter_choice,
            Some(ParameterChoice::StringParam("fast".to_string()))
        );
    }

    #[test]
    fn request_ids_are_unique() {
        let a = next_request_id();
        let b = next_request_id();
        assert_ne!(a, b);
    }

    #[test]
    fn decodes_fp64_and_infers_float() {
        let tensor = InferOutputTensor {
            name: "out".to_string(),
            datatype: "FP64".to_string(),
            shape: vec![2],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                fp64_contents: vec![1.0, 2.0],
                ..Default::default()
            }),
        };
        let values = decode_output(&tensor, None).unwrap();
        assert_eq!(values, vec![PointValue::Double(1.0), PointValue::Double(2.0)]);
    }

    #[test]
    fn decodes_int32_and_bool_tensors() {
        let int_tensor = InferOutputTensor {
            name: "out".to_string(),
            datatype: "INT32".to_string(),
            shape: vec![2],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                int_contents: vec![3, 4],
                ..Default::default()
            }),
        };
        assert_eq!(
            decode_output(&int_tensor, None).unwrap(),
            vec![PointValue::Int(3), PointValue::Int(4)]
        );

        let bool_tensor = InferOutputTensor {
            name: "out".to_string(),
            datatype: "BOOL".to_string(),
            shape: vec![2],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                bool_contents: vec![true, false],
                ..Default::default()
            }),
        };
        assert_eq!(
            decode_output(&bool_tensor, None).unwrap(),
            vec![PointValue::Int(1), PointValue::Int(0)]
        );
    }

    #[test]
    fn configured_data_type_overrides_inference() {
        let tensor = InferOutputTensor {
            name: "out".to_string(),
            datatype: "FP64".to_string(),
            shape: vec![1],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                fp64_contents: vec![2.9],
                ..Default::default()
            }),
        };
        assert_eq!(
            decode_output(&tensor, Some(DataType::Int)).unwrap(),
            vec![PointValue::Int(2)]
        );
    }

    #[test]
    fn bytes_tensor_is_not_metricized() {
        let tensor = InferOutputTensor {
            name: "label".to_string(),
            datatype: "BYTES".to_string(),
            shape: vec![1],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                bytes_contents: vec![b"anomaly".to_vec()],
                ..Default::default()
            }),
        };
        assert!(decode_output(&tensor, None).is_none());
    }

    #[test]
    fn unknown_dtype_falls_back_to_fp64() {
        let tensor = InferOutputTensor {
            name: "out".to_string(),
            datatype: "FP16".to_string(),
            shape: vec![1],
            parameters: HashMap::new(),
            contents: Some(InferTensorContents {
                fp64_contents: vec![7.0],
                ..Default::default()
            }),
        };
        assert_eq!(
            decode_output(&tensor, None).unwrap(),
            vec![PointValue::Double(7.0)]
        );
    }

    #[test]
    fn output_tensor_selection_prefers_output_index() {
        let response = ModelInferResponse {
            outputs: vec![
                InferOutputTensor {
                    name: "first".to_string(),
                    ..Default::default()
                },
                InferOutputTensor {
                    name: "second".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(select_output_tensor(&response, 0, Some(1)).unwrap().name, "second");
        assert_eq!(select_output_tensor(&response, 1, None).unwrap().name, "second");
        assert!(select_output_tensor(&response, 0, Some(5)).is_none());
        assert!(select_output_tensor(&response, 9, None).is_none());
    }
}
