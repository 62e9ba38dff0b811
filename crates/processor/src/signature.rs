// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Pre-inference validation of a rule against the model's cached signature.
//!
//! Checks arity, element-type compatibility and shape. A validation failure
//! skips the rule for the current batch only; other rules and pass-through
//! are unaffected. When no signature is cached (or the signature declares no
//! inputs) validation is skipped entirely.

use crate::error::RuleError;
use crate::metadata::{ElementType, ModelSignature, TensorSpec};
use crate::pdata::{NumericPoint, PointValue};
use crate::rules::CompiledRule;

/// Validates the rule's selected inputs against `signature`.
///
/// `inputs` is the per-input selected point list, parallel to the rule's
/// input declarations.
pub fn validate_rule(
    rule: &CompiledRule,
    signature: &ModelSignature,
    inputs: &[(String, Vec<NumericPoint>)],
) -> Result<(), RuleError> {
    if signature.inputs.is_empty() {
        return Ok(());
    }

    if inputs.len() != signature.inputs.len() {
        return Err(RuleError::SignatureMismatch {
            model: rule.model_name.clone(),
            reason: format!(
                "input arity mismatch: rule declares {} inputs, model expects {}",
                inputs.len(),
                signature.inputs.len()
            ),
        });
    }

    for ((input_name, points), spec) in inputs.iter().zip(&signature.inputs) {
        check_element_type(&rule.model_name, input_name, points, spec)?;
        check_shape(&rule.model_name, input_name, points, spec)?;
    }
    Ok(())
}

/// Floating-point dtypes accept int or float samples; integer dtypes accept
/// both (non-whole floats are a quality concern, logged but tolerated); BOOL
/// accepts int samples only.
fn check_element_type(
    model: &str,
    input_name: &str,
    points: &[NumericPoint],
    spec: &TensorSpec,
) -> Result<(), RuleError> {
    let has_float = points
        .iter()
        .flat_map(|p| &p.values)
        .any(|v| !v.is_int());

    match &spec.dtype {
        ElementType::Bool => {
            if has_float {
                return Err(RuleError::SignatureMismatch {
                    model: model.to_string(),
                    reason: format!(
                        "input `{input_name}`: BOOL tensor cannot carry float samples"
                    ),
                });
            }
        }
        dtype if dtype.is_integer() => {
            let has_fractional = points
                .iter()
                .flat_map(|p| &p.values)
                .any(|v| matches!(v, PointValue::Double(d) if d.fract() != 0.0));
            if has_fractional {
                log::warn!(
                    "model {model}: input `{input_name}` carries non-whole floats for {dtype} tensor; values will be truncated by the server",
                );
            }
        }
        dtype if dtype.is_float() => {}
        ElementType::Bytes => {
            return Err(RuleError::SignatureMismatch {
                model: model.to_string(),
                reason: format!(
                    "input `{input_name}`: BYTES tensors are not supported for metric inputs"
                ),
            });
        }
        other => {
            log::warn!(
                "model {model}: input `{input_name}` has unrecognized dtype {other}; type check skipped",
            );
        }
    }
    Ok(())
}

/// Scalar signatures require exactly one data point; 1-D `-1` accepts any
/// count; 1-D fixed `N` requires exactly `N`. Multi-dimensional shapes are
/// permitted and only logged.
fn check_shape(
    model: &str,
    input_name: &str,
    points: &[NumericPoint],
    spec: &TensorSpec,
) -> Result<(), RuleError> {
    let count = points.len();
    match spec.shape.as_slice() {
        [] => {
            if count != 1 {
                return Err(RuleError::SignatureMismatch {
                    model: model.to_string(),
                    reason: format!(
                        "input `{input_name}`: scalar tensor requires exactly one data point, got {count}"
                    ),
                });
            }
        }
        [-1] => {}
        [expected] => {
            if count as i64 != *expected {
                return Err(RuleError::SignatureMismatch {
                    model: model.to_string(),
                    reason: format!(
                        "input `{input_name}`: tensor shape [{expected}] requires exactly {expected} data points, got {count}"
                    ),
                });
            }
        }
        shape => {
            log::debug!(
                "model {model}: input `{input_name}` declares multi-dimensional shape {shape:?}; shape check skipped",
            );
        }
    }
    Ok(())
}
