// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the inference processor.
//!
//! The processor is configured from any `serde` source (the host pipeline
//! owns file loading). Durations use humantime strings (`"10s"`, `"500ms"`).
//!
//! Example configuration (YAML):
//! ```yaml
//! grpc:
//!   endpoint: "http://localhost:8001"
//!   compression: true
//!   headers:
//!     x-api-key: "secret"
//! timeout: 10s
//! rules:
//!   - model_name: "memory_product"
//!     inputs:
//!       - "mem.util"
//!       - "mem.limit"
//!     parameters:
//!       scale: 1.5
//! ```

use crate::error::ConfigError;
use crate::naming::NamingConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Reserved endpoint value that skips the gRPC connection entirely and
/// degrades the processor to pure pass-through. Useful for validating the
/// pipeline lifecycle without a model server.
pub const PASSTHROUGH_ENDPOINT: &str = "passthrough://";

/// Top-level processor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Connection settings for the model server.
    pub grpc: GrpcClientConfig,

    /// Per-inference-call timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Per-metadata-call timeout applied during start.
    #[serde(default = "default_metadata_timeout", with = "humantime_serde")]
    pub metadata_timeout: Duration,

    /// Output-name generator tuning.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Inference rules, applied per batch in declaration order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Config {
    /// Builds a [`Config`] from a JSON value, mirroring how the host
    /// pipeline hands node configuration to processors.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidUserConfig {
            error: e.to_string(),
        })
    }
}

/// gRPC client settings for the model server connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrpcClientConfig {
    /// The model server endpoint (`host:port` or a full URI). The reserved
    /// value [`PASSTHROUGH_ENDPOINT`] disables inference entirely.
    pub endpoint: String,

    /// Connect over TLS using the system trust roots.
    #[serde(default)]
    pub use_ssl: bool,

    /// Compress requests (and accept compressed responses) with gzip.
    #[serde(default)]
    pub compression: bool,

    /// Maximum size of a received message, in bytes.
    #[serde(default)]
    pub max_receive_message_size: Option<usize>,

    /// Metadata headers attached to every call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// HTTP/2 keepalive settings. Disabled when absent.
    #[serde(default)]
    pub keepalive: Option<KeepaliveConfig>,
}

/// HTTP/2 keepalive tuning, mirroring the collector's gRPC client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeepaliveConfig {
    /// Interval between keepalive pings.
    #[serde(default = "default_keepalive_time", with = "humantime_serde")]
    pub time: Duration,

    /// How long to wait for a ping acknowledgement before the connection is
    /// considered dead.
    #[serde(default = "default_keepalive_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Send keepalive pings even with no in-flight streams.
    #[serde(default)]
    pub permit_without_stream: bool,
}

/// A single inference rule: input metrics in, model call, output metrics out.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// The model to invoke. Must be non-empty.
    pub model_name: String,

    /// Optional model version; the server picks one when absent.
    #[serde(default)]
    pub model_version: Option<String>,

    /// Input selectors in tensor order. Must be non-empty. Each entry uses
    /// the `name{k="v",…}` selector syntax.
    pub inputs: Vec<String>,

    /// Output metric declarations. When empty, outputs are discovered from
    /// the model's metadata at start.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,

    /// Optional template overriding output naming. Placeholders: `{output}`,
    /// `{model}`, `{version}`, `{input}`, `{input[N]}`.
    #[serde(default)]
    pub output_pattern: Option<String>,

    /// Scalar parameters forwarded with every inference request.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

/// A declared output metric.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// The output metric name. Defaults to the model's output tensor name
    /// (run through the naming machinery) when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// The decoded value type. Inferred from the response tensor dtype when
    /// absent.
    #[serde(default)]
    pub data_type: Option<DataType>,

    /// Metric description. Defaults to `Inference result from model <name>`.
    #[serde(default)]
    pub description: Option<String>,

    /// Metric unit.
    #[serde(default)]
    pub unit: Option<String>,

    /// Index into the response tensor list. Positional matching is used when
    /// absent.
    #[serde(default)]
    pub output_index: Option<usize>,
}

/// The value type of a decoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Floating-point output values.
    Float,
    /// Integer output values.
    Int,
    /// Boolean output values (metricized as 0/1).
    Bool,
    /// String output values (logged, never metricized).
    String,
}

/// A typed scalar rule parameter.
///
/// The KServe protocol has no native float parameter; float values are
/// serialized as their decimal string on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean parameter.
    Bool(bool),
    /// An integer parameter.
    Int(i64),
    /// A float parameter (sent as a decimal string).
    Float(f64),
    /// A string parameter.
    String(String),
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_metadata_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_keepalive_time() -> Duration {
    Duration::from_secs(30)
}

const fn default_keepalive_timeout() -> Duration {
    Duration::from_secs(10)
}
