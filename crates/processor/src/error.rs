// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the inference processor.
//!
//! Two families with different dispositions: [`ConfigError`] is raised while
//! constructing or starting the processor and fails startup; [`RuleError`]
//! covers per-rule, per-batch failures that are logged and cause only the
//! affected rule (or output) to be skipped. Input metrics are forwarded
//! downstream regardless of any `RuleError`.

use crate::selector::SelectorError;
use std::time::Duration;

/// Errors detected while validating configuration or starting the processor.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The user-supplied configuration value could not be deserialized.
    #[error("invalid user config: {error}")]
    InvalidUserConfig {
        /// A description of the deserialization failure.
        error: String,
    },

    /// A rule was declared without a model name.
    #[error("rule {rule}: model_name must not be empty")]
    EmptyModelName {
        /// Zero-based index of the offending rule.
        rule: usize,
    },

    /// A rule was declared without input selectors.
    #[error("rule {rule}: at least one input selector is required")]
    NoInputs {
        /// Zero-based index of the offending rule.
        rule: usize,
    },

    /// An input selector failed to parse.
    #[error("rule {rule}: invalid input selector `{selector}`: {error}")]
    InvalidSelector {
        /// Zero-based index of the offending rule.
        rule: usize,
        /// The selector string as configured.
        selector: String,
        /// The parse error.
        #[source]
        error: SelectorError,
    },

    /// An output pattern is structurally malformed.
    #[error("rule {rule}: invalid output_pattern `{pattern}`: {error}")]
    InvalidOutputPattern {
        /// Zero-based index of the offending rule.
        rule: usize,
        /// The pattern as configured.
        pattern: String,
        /// Why the pattern was rejected.
        error: String,
    },

    /// Two outputs of the same rule resolved to the same metric name.
    #[error("rule {rule}: duplicate output name `{name}`")]
    DuplicateOutputName {
        /// Zero-based index of the offending rule.
        rule: usize,
        /// The colliding output metric name.
        name: String,
    },

    /// The configured endpoint could not be turned into a gRPC channel.
    #[error("invalid gRPC endpoint `{endpoint}`: {error}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// The transport-level build error.
        error: String,
    },

    /// A configured header is not a valid gRPC metadata entry.
    #[error("invalid gRPC header `{name}`: {error}")]
    InvalidHeader {
        /// The header name as configured.
        name: String,
        /// Why the header was rejected.
        error: String,
    },

    /// The liveness probe at start failed or reported a dead server.
    #[error("liveness probe against `{endpoint}` failed: {error}")]
    LivenessProbe {
        /// The endpoint that was probed.
        endpoint: String,
        /// The probe failure (RPC error or `live=false`).
        error: String,
    },
}

/// Per-rule, per-batch failures. These never propagate to the host pipeline.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    /// One or more rule inputs had no matching metric (or no matching data
    /// points) in the current batch.
    #[error("missing inputs: {missing:?}")]
    MissingInputs {
        /// Names of the selectors that did not resolve.
        missing: Vec<String>,
    },

    /// The rule does not agree with the model's self-described signature.
    #[error("signature mismatch for model `{model}`: {reason}")]
    SignatureMismatch {
        /// The model whose signature was violated.
        model: String,
        /// The specific arity/type/shape violation.
        reason: String,
    },

    /// The matcher found no aligned data-point groups for this rule.
    #[error("no aligned data-point groups for model `{model}`")]
    NoAlignedGroups {
        /// The model the rule targets.
        model: String,
    },

    /// The inference RPC failed. The gRPC status code is preserved.
    #[error("inference call for model `{model}` failed: {status}")]
    Rpc {
        /// The model the call targeted.
        model: String,
        /// The gRPC status returned by the transport or server.
        status: tonic::Status,
    },

    /// The inference call exceeded the configured per-call timeout.
    #[error("inference call for model `{model}` timed out after {timeout:?}")]
    Timeout {
        /// The model the call targeted.
        model: String,
        /// The timeout that was applied.
        timeout: Duration,
    },

    /// The response tensor set does not line up with the rule's outputs.
    #[error("response shape error for model `{model}`: {reason}")]
    ResponseShape {
        /// The model that produced the response.
        model: String,
        /// The specific shape violation.
        reason: String,
    },

    /// Inference was requested before the processor was started.
    #[error("inference client is not started")]
    NotStarted,
}

impl RuleError {
    /// The gRPC status code carried by this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<tonic::Code> {
        match self {
            RuleError::Rpc { status, .. } => Some(status.code()),
            _ => None,
        }
    }
}
