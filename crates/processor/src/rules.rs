// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Rule compilation: configured rules are parsed and validated at processor
//! construction, then reconciled with the model signatures fetched at start.
//!
//! The output naming plan is fixed here, once, so that every batch produces
//! identical output metric names and two rules sharing a model never
//! collide (each rule derives discovered names from its own inputs).

use crate::config::{Config, DataType, OutputConfig, ParamValue, Rule};
use crate::error::ConfigError;
use crate::metadata::{ElementType, SignatureCache};
use crate::naming::{self, NamingConfig};
use crate::selector::LabelSelector;
use std::collections::BTreeMap;

/// A runtime-ready output spec with its name plan resolved.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    /// The output metric name, fixed at compile time.
    pub name: String,
    /// The decoded value type, if pinned by config or inherited from the
    /// model signature.
    pub data_type: Option<DataType>,
    /// Metric description override.
    pub description: Option<String>,
    /// Metric unit.
    pub unit: Option<String>,
    /// Explicit index into the response tensor list.
    pub output_index: Option<usize>,
    /// True when this spec was synthesized from model metadata rather than
    /// declared by the user.
    pub discovered: bool,
}

/// A compiled, immutable rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The model to invoke.
    pub model_name: String,
    /// Optional model version.
    pub model_version: Option<String>,
    /// Input metric names, in tensor order (selector metric names).
    pub inputs: Vec<String>,
    /// Parsed selectors, parallel to `inputs`.
    pub input_selectors: Vec<LabelSelector>,
    /// Resolved outputs. Empty when nothing was declared and no signature
    /// was available; such a rule still runs but its responses are dropped.
    pub outputs: Vec<OutputSpec>,
    /// Scalar parameters forwarded with every request.
    pub parameters: BTreeMap<String, ParamValue>,
    /// The raw output pattern, kept for signature folding.
    output_pattern: Option<String>,
    /// Declared outputs awaiting name resolution during folding.
    declared_outputs: Vec<OutputConfig>,
}

impl CompiledRule {
    /// Input metric names as `&str` slices, for the naming machinery.
    fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(String::as_str).collect()
    }
}

/// Parses and validates every configured rule. Any violation fails
/// construction.
pub fn compile_rules(config: &Config) -> Result<Vec<CompiledRule>, ConfigError> {
    config
        .rules
        .iter()
        .enumerate()
        .map(|(index, rule)| compile_rule(index, rule))
        .collect()
}

fn compile_rule(index: usize, rule: &Rule) -> Result<CompiledRule, ConfigError> {
    if rule.model_name.trim().is_empty() {
        return Err(ConfigError::EmptyModelName { rule: index });
    }
    if rule.inputs.is_empty() {
        return Err(ConfigError::NoInputs { rule: index });
    }

    let mut selectors = Vec::with_capacity(rule.inputs.len());
    for selector in &rule.inputs {
        let parsed =
            LabelSelector::parse(selector).map_err(|error| ConfigError::InvalidSelector {
                rule: index,
                selector: selector.clone(),
                error,
            })?;
        selectors.push(parsed);
    }

    if let Some(pattern) = &rule.output_pattern {
        naming::validate_pattern(pattern).map_err(|error| ConfigError::InvalidOutputPattern {
            rule: index,
            pattern: pattern.clone(),
            error: error.to_string(),
        })?;
    }

    let inputs: Vec<String> = selectors.iter().map(|s| s.metric_name.clone()).collect();

    Ok(CompiledRule {
        model_name: rule.model_name.clone(),
        model_version: rule.model_version.clone(),
        inputs,
        input_selectors: selectors,
        outputs: Vec::new(),
        parameters: rule.parameters.clone(),
        output_pattern: rule.output_pattern.clone(),
        declared_outputs: rule.outputs.clone(),
    })
}

/// Folds the fetched model signatures into the compiled rules, finalizing
/// the output naming plan. Runs once at start, after the metadata cache is
/// populated; rules are immutable afterwards.
pub fn fold_signatures(
    rules: &mut [CompiledRule],
    cache: &SignatureCache,
    naming_config: &NamingConfig,
) -> Result<(), ConfigError> {
    for (index, rule) in rules.iter_mut().enumerate() {
        let signature = cache.get(&rule.model_name);

        let outputs = if rule.declared_outputs.is_empty() {
            match signature {
                // Discover one output per model output tensor.
                Some(signature) => signature
                    .outputs
                    .iter()
                    .map(|tensor| OutputSpec {
                        name: resolve_name(rule, &tensor.name, naming_config),
                        data_type: Some(data_type_for(&tensor.dtype)),
                        description: None,
                        unit: None,
                        output_index: None,
                        discovered: true,
                    })
                    .collect(),
                None => {
                    log::warn!(
                        "rule {index}: no outputs configured and no metadata available for model `{}`; inference responses will be dropped",
                        rule.model_name
                    );
                    Vec::new()
                }
            }
        } else {
            rule.declared_outputs
                .iter()
                .enumerate()
                .map(|(position, declared)| {
                    let base = declared.name.clone().unwrap_or_else(|| {
                        tensor_name_for(signature, declared.output_index, position)
                    });
                    let data_type = declared.data_type.or_else(|| {
                        // Inherit the element type from the signature slot
                        // named by output_index.
                        declared.output_index.and_then(|idx| {
                            signature
                                .and_then(|s| s.outputs.get(idx))
                                .map(|t| data_type_for(&t.dtype))
                        })
                    });
                    OutputSpec {
                        name: resolve_declared_name(rule, &base, declared, naming_config),
                        data_type,
                        description: declared.description.clone(),
                        unit: declared.unit.clone(),
                        output_index: declared.output_index,
                        discovered: false,
                    }
                })
                .collect()
        };

        // Enforce the per-rule uniqueness invariant of the naming plan.
        for i in 1..outputs.len() {
            let name = outputs[i].name.clone();
            if outputs[..i].iter().any(|o| o.name == name) {
                return Err(ConfigError::DuplicateOutputName { rule: index, name });
            }
        }

        rule.outputs = outputs;
    }
    Ok(())
}

/// Name resolution for discovered outputs: the pattern wins when present and
/// applicable, else the intelligent name.
fn resolve_name(rule: &CompiledRule, tensor_name: &str, config: &NamingConfig) -> String {
    let inputs = rule.input_names();
    if let Some(pattern) = &rule.output_pattern {
        match naming::apply_pattern(
            pattern,
            tensor_name,
            &rule.model_name,
            rule.model_version.as_deref(),
            &inputs,
        ) {
            Ok(name) => return name,
            Err(error) => {
                log::warn!(
                    "output pattern `{pattern}` for model `{}` is not applicable ({error}); falling back to generated name",
                    rule.model_name
                );
            }
        }
    }
    naming::intelligent_name(&inputs, tensor_name, config)
}

/// Name resolution for declared outputs: the literal name is kept unless a
/// pattern rewrites it.
fn resolve_declared_name(
    rule: &CompiledRule,
    base: &str,
    declared: &OutputConfig,
    config: &NamingConfig,
) -> String {
    if rule.output_pattern.is_some() {
        return resolve_name(rule, base, config);
    }
    match &declared.name {
        Some(name) => name.clone(),
        // Nameless declared output: run the base tensor name through the
        // generator so the result is still input-qualified.
        None => naming::intelligent_name(&rule.input_names(), base, config),
    }
}

/// Fallback tensor name for a declared output with no name of its own.
fn tensor_name_for(
    signature: Option<&crate::metadata::ModelSignature>,
    output_index: Option<usize>,
    position: usize,
) -> String {
    let index = output_index.unwrap_or(position);
    signature
        .and_then(|s| s.outputs.get(index))
        .map(|t| t.name.clone())
        .unwrap_or_else(|| format!("output_{index}"))
}

fn data_type_for(dtype: &ElementType) -> DataType {
    match dtype {
        ElementType::Fp32 | ElementType::Fp64 => DataType::Float,
        ElementType::Bool => DataType::Bool,
        ElementType::Bytes => DataType::String,
        dtype if dtype.is_integer() => DataType::Int,
        _ => DataType::Float,
    }
}
