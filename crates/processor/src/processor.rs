// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The inference processor: per-batch orchestration and lifecycle.
//!
//! For every resource in a batch the processor applies each compiled rule in
//! declaration order: select inputs, validate against the cached model
//! signature, align data-point groups, encode, call the model server, decode
//! and splice the synthesized metrics back into the batch. Input metrics are
//! never mutated or removed; the batch is always forwarded downstream, even
//! when every rule fails.
//!
//! Lifecycle: `New → Started → Stopped`. Batch processing is re-entrant in
//! `Started`; shared mutable state is limited to the client handle behind a
//! mutex held only briefly, and the signature cache which is frozen after
//! start.

use crate::client::InferenceClient;
use crate::config::Config;
use crate::error::{ConfigError, RuleError};
use crate::matcher::{self, PointGroup};
use crate::metadata::{ModelSignature, SignatureCache};
use crate::pdata::{NumericPoint, extract_points};
use crate::rules::{CompiledRule, compile_rules, fold_signatures};
use crate::signature::validate_rule;
use crate::synthesizer::synthesize_output;
use crate::tensor::{decode_output, encode_request, select_output_tensor};
use async_trait::async_trait;
use opentelemetry_proto::tonic::metrics::v1::{MetricsData, ResourceMetrics, ScopeMetrics};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// The downstream half of the pipeline contract: whatever consumes the
/// (augmented) batches this processor forwards.
#[async_trait]
pub trait MetricsConsumer: Send + Sync {
    /// Consumes one metrics batch.
    async fn consume_metrics(&self, batch: MetricsData);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Started,
    Stopped,
}

#[derive(Debug)]
struct Shared {
    state: State,
    client: Option<InferenceClient>,
}

/// The metrics inference processor. Construct with [`InferenceProcessor::new`],
/// call [`start`](InferenceProcessor::start) before the first batch and
/// [`shutdown`](InferenceProcessor::shutdown) when the pipeline stops.
pub struct InferenceProcessor {
    config: Config,
    rules: Vec<CompiledRule>,
    cache: SignatureCache,
    shared: Mutex<Shared>,
    next: Arc<dyn MetricsConsumer>,
}

impl InferenceProcessor {
    /// Compiles the configured rules and builds the processor. Configuration
    /// violations are rejected here.
    pub fn new(config: Config, next: Arc<dyn MetricsConsumer>) -> Result<Self, ConfigError> {
        let rules = compile_rules(&config)?;
        Ok(Self {
            config,
            rules,
            cache: SignatureCache::new(),
            shared: Mutex::new(Shared {
                state: State::New,
                client: None,
            }),
            next,
        })
    }

    /// Opens the gRPC channel, probes liveness, fetches model metadata and
    /// finalizes the rules' output naming plan. Connectivity failures fail
    /// start; metadata absence does not.
    pub async fn start(&mut self) -> Result<(), ConfigError> {
        {
            let shared = self.lock_shared();
            match shared.state {
                State::New => {}
                State::Started => {
                    log::warn!("inference processor already started");
                    return Ok(());
                }
                State::Stopped => {
                    log::warn!("inference processor restarted after shutdown is not supported");
                    return Ok(());
                }
            }
        }

        let client = InferenceClient::connect(&self.config.grpc, self.config.timeout)?;
        client.probe_liveness(&self.config.grpc.endpoint).await?;

        if !client.is_passthrough() {
            self.fetch_signatures(&client).await;
        }

        fold_signatures(&mut self.rules, &self.cache, &self.config.naming)?;

        let mut shared = self.lock_shared();
        shared.client = Some(client);
        shared.state = State::Started;
        Ok(())
    }

    /// One metadata request per distinct model across all rules, bounded by
    /// the metadata timeout. Failures are logged and tolerated.
    async fn fetch_signatures(&mut self, client: &InferenceClient) {
        let mut models: BTreeMap<String, Option<String>> = BTreeMap::new();
        for rule in &self.rules {
            let _ = models
                .entry(rule.model_name.clone())
                .or_insert_with(|| rule.model_version.clone());
        }

        for (model, version) in models {
            if let Some(false) = client.model_ready(&model, version.as_deref()).await {
                log::warn!("model `{model}` reports not ready; inference may fail");
            }
            match client
                .model_metadata(&model, version.as_deref(), self.config.metadata_timeout)
                .await
            {
                Ok(response) => {
                    self.cache.insert(&model, ModelSignature::from(&response));
                }
                Err(status) => {
                    log::warn!(
                        "metadata unavailable for model `{model}` ({status}); signature validation skipped"
                    );
                }
            }
        }
    }

    /// Processes one batch and forwards it downstream. Rule failures are
    /// logged and isolated; the input metrics always pass through unchanged.
    pub async fn consume_metrics(&self, mut batch: MetricsData) {
        let client = {
            let shared = self.lock_shared();
            match shared.state {
                State::Started => shared.client.clone(),
                _ => None,
            }
        };

        if let Some(client) = client {
            if !client.is_passthrough() {
                self.process_batch(&client, &mut batch).await;
            }
        } else {
            log::debug!("inference processor not started; passing batch through");
        }

        self.next.consume_metrics(batch).await;
    }

    /// Closes the channel with a brief grace delay. Terminal.
    pub async fn shutdown(&mut self) {
        let client = {
            let mut shared = self.lock_shared();
            shared.state = State::Stopped;
            shared.client.take()
        };
        if let Some(client) = client {
            client.shutdown().await;
        }
    }

    async fn process_batch(&self, client: &InferenceClient, batch: &mut MetricsData) {
        for resource in &mut batch.resource_metrics {
            self.process_resource(client, resource).await;
        }
    }

    async fn process_resource(&self, client: &InferenceClient, resource: &mut ResourceMetrics) {
        // First occurrence wins for both indexes; appended outputs never
        // invalidate the recorded positions.
        let mut metric_index: HashMap<String, (usize, usize)> = HashMap::new();
        for (scope_idx, scope) in resource.scope_metrics.iter().enumerate() {
            for (metric_idx, metric) in scope.metrics.iter().enumerate() {
                let _ = metric_index
                    .entry(metric.name.clone())
                    .or_insert((scope_idx, metric_idx));
            }
        }

        for (rule_index, rule) in self.rules.iter().enumerate() {
            if let Err(error) = self
                .apply_rule(client, resource, &metric_index, rule)
                .await
            {
                log::warn!(
                    "rule {rule_index} (model `{}`) skipped for this batch: {error}",
                    rule.model_name
                );
            }
        }
    }

    async fn apply_rule(
        &self,
        client: &InferenceClient,
        resource: &mut ResourceMetrics,
        metric_index: &HashMap<String, (usize, usize)>,
        rule: &CompiledRule,
    ) -> Result<(), RuleError> {
        let (inputs, primary_scope) = gather_inputs(resource, metric_index, rule)?;

        if let Some(signature) = self.cache.get(&rule.model_name) {
            validate_rule(rule, signature, &inputs)?;
        }

        let groups = matcher::align_groups(&inputs);
        if groups.is_empty() {
            return Err(RuleError::NoAlignedGroups {
                model: rule.model_name.clone(),
            });
        }

        let request = encode_request(rule, &groups);
        let response = client.model_infer(request).await?;

        if rule.outputs.is_empty() {
            log::info!(
                "model `{}` responded but the rule has no outputs configured or discovered; response dropped",
                rule.model_name
            );
            return Ok(());
        }

        let timestamp = now_unix_nanos();
        let scope = target_scope(resource, primary_scope);
        for (position, output) in rule.outputs.iter().enumerate() {
            let Some(tensor) = select_output_tensor(&response, position, output.output_index)
            else {
                log::warn!(
                    "output `{}` of model `{}`: response tensor index out of range; output skipped",
                    output.name,
                    rule.model_name
                );
                continue;
            };
            let Some(values) = decode_output(tensor, output.data_type) else {
                continue;
            };
            if let Some(values) = check_value_count(&rule.model_name, output, &groups, values) {
                synthesize_output(scope, rule, output, &groups, &values, timestamp);
            }
        }
        Ok(())
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves every rule input against the resource's metric index and filters
/// data points through the selectors. Any unresolved selector fails the rule
/// with the full missing-input list.
fn gather_inputs(
    resource: &ResourceMetrics,
    metric_index: &HashMap<String, (usize, usize)>,
    rule: &CompiledRule,
) -> Result<(Vec<(String, Vec<NumericPoint>)>, Option<usize>), RuleError> {
    let mut inputs = Vec::with_capacity(rule.input_selectors.len());
    let mut missing = Vec::new();
    let mut primary_scope = None;

    for selector in &rule.input_selectors {
        match metric_index.get(&selector.metric_name) {
            Some(&(scope_idx, metric_idx)) => {
                let metric = &resource.scope_metrics[scope_idx].metrics[metric_idx];
                let points: Vec<NumericPoint> = extract_points(metric)
                    .into_iter()
                    .filter(|p| selector.matches_attributes(&p.attributes))
                    .collect();
                if points.is_empty() {
                    missing.push(selector.metric_name.clone());
                } else {
                    if primary_scope.is_none() {
                        primary_scope = Some(scope_idx);
                    }
                    inputs.push((selector.metric_name.clone(), points));
                }
            }
            None => missing.push(selector.metric_name.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(RuleError::MissingInputs { missing });
    }
    Ok((inputs, primary_scope))
}

/// The scope receiving synthesized outputs: the primary input's scope, else
/// the resource's first scope (created when none exists).
fn target_scope(resource: &mut ResourceMetrics, primary: Option<usize>) -> &mut ScopeMetrics {
    let index = match primary {
        Some(index) => index,
        None => {
            if resource.scope_metrics.is_empty() {
                resource.scope_metrics.push(ScopeMetrics::default());
            }
            0
        }
    };
    &mut resource.scope_metrics[index]
}

/// Enforces the group-count invariant on a decoded value vector: shorter
/// than the group count is a response-shape failure (the output is skipped),
/// surplus values are truncated with a debug note.
fn check_value_count(
    model: &str,
    output: &crate::rules::OutputSpec,
    groups: &[PointGroup],
    values: Vec<crate::pdata::PointValue>,
) -> Option<Vec<crate::pdata::PointValue>> {
    if values.is_empty() {
        log::warn!(
            "output `{}` of model `{model}`: response tensor has empty contents; output skipped",
            output.name
        );
        return None;
    }
    if values.len() < groups.len() {
        log::warn!(
            "output `{}` of model `{model}`: {} values for {} aligned groups; output skipped",
            output.name,
            values.len(),
            groups.len()
        );
        return None;
    }
    if values.len() > groups.len() {
        log::debug!(
            "output `{}` of model `{model}`: response carries {} surplus values",
            output.name,
            values.len() - groups.len()
        );
    }
    let mut values = values;
    values.truncate(groups.len());
    Some(values)
}

/// Current wall clock in unix nanoseconds, stamped on synthesized points.
fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
