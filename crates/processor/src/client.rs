// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The inference client: one pooled gRPC channel per processor, opened at
//! start after a liveness probe, closed at shutdown with a brief grace
//! delay.
//!
//! Every call derives a deadline from the configured timeout; dropping the
//! caller's future cancels the in-flight RPC. The reserved
//! [`PASSTHROUGH_ENDPOINT`](crate::config::PASSTHROUGH_ENDPOINT) skips the
//! connection entirely and makes every call report [`RuleError::NotStarted`]
//! to the orchestrator, which then degrades to pure pass-through.

use crate::config::{GrpcClientConfig, PASSTHROUGH_ENDPOINT};
use crate::error::{ConfigError, RuleError};
use otel_infer_kserve::inference::grpc_inference_service_client::GrpcInferenceServiceClient;
use otel_infer_kserve::inference::{
    ModelInferRequest, ModelInferResponse, ModelMetadataRequest, ModelMetadataResponse,
    ModelReadyRequest, ServerLiveRequest,
};
use std::str::FromStr;
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// How long shutdown lingers to let transport cleanup complete.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(50);

/// A connected (or passthrough) inference client. Cloning is cheap: clones
/// share the underlying HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    Connected {
        client: GrpcInferenceServiceClient<Channel>,
        headers: Vec<(AsciiMetadataKey, AsciiMetadataValue)>,
        timeout: Duration,
    },
    Passthrough,
}

impl InferenceClient {
    /// Builds the channel from configuration. The connection itself is
    /// established lazily; [`InferenceClient::probe_liveness`] performs the
    /// first real exchange.
    pub fn connect(config: &GrpcClientConfig, timeout: Duration) -> Result<Self, ConfigError> {
        if config.endpoint == PASSTHROUGH_ENDPOINT {
            log::info!("inference endpoint is the passthrough placeholder; inference disabled");
            return Ok(Self {
                mode: Mode::Passthrough,
            });
        }

        let headers = parse_headers(config)?;
        let endpoint = build_endpoint(config)?;
        let channel = endpoint.connect_lazy();

        let mut client = GrpcInferenceServiceClient::new(channel);
        if config.compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        if let Some(limit) = config.max_receive_message_size {
            client = client.max_decoding_message_size(limit);
        }

        Ok(Self {
            mode: Mode::Connected {
                client,
                headers,
                timeout,
            },
        })
    }

    /// True when the client is the passthrough placeholder.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self.mode, Mode::Passthrough)
    }

    /// Issues the `ServerLive` probe. Called once at start; failure (RPC
    /// error or `live=false`) fails startup.
    pub async fn probe_liveness(&self, endpoint: &str) -> Result<(), ConfigError> {
        let Mode::Connected {
            client,
            headers,
            timeout,
        } = &self.mode
        else {
            return Ok(());
        };

        let mut client = client.clone();
        let request = with_headers(tonic::Request::new(ServerLiveRequest {}), headers);
        let response = tokio::time::timeout(*timeout, client.server_live(request))
            .await
            .map_err(|_| ConfigError::LivenessProbe {
                endpoint: endpoint.to_string(),
                error: format!("probe timed out after {timeout:?}"),
            })?
            .map_err(|status| ConfigError::LivenessProbe {
                endpoint: endpoint.to_string(),
                error: status.to_string(),
            })?;

        if !response.into_inner().live {
            return Err(ConfigError::LivenessProbe {
                endpoint: endpoint.to_string(),
                error: "server reports live=false".to_string(),
            });
        }
        Ok(())
    }

    /// Best-effort readiness check for one model. Not-ready is a warning
    /// condition, never fatal.
    pub async fn model_ready(&self, model: &str, version: Option<&str>) -> Option<bool> {
        let Mode::Connected {
            client,
            headers,
            timeout,
        } = &self.mode
        else {
            return None;
        };

        let mut client = client.clone();
        let request = with_headers(
            tonic::Request::new(ModelReadyRequest {
                name: model.to_string(),
                version: version.unwrap_or("").to_string(),
            }),
            headers,
        );
        match tokio::time::timeout(*timeout, client.model_ready(request)).await {
            Ok(Ok(response)) => Some(response.into_inner().ready),
            Ok(Err(status)) => {
                log::debug!("model readiness check for `{model}` failed: {status}");
                None
            }
            Err(_) => None,
        }
    }

    /// Fetches a model's metadata, bounded by `timeout` (the metadata
    /// timeout, not the inference timeout).
    pub async fn model_metadata(
        &self,
        model: &str,
        version: Option<&str>,
        timeout: Duration,
    ) -> Result<ModelMetadataResponse, tonic::Status> {
        let Mode::Connected {
            client, headers, ..
        } = &self.mode
        else {
            return Err(tonic::Status::unavailable("inference disabled"));
        };

        let mut client = client.clone();
        let request = with_headers(
            tonic::Request::new(ModelMetadataRequest {
                name: model.to_string(),
                version: version.unwrap_or("").to_string(),
            }),
            headers,
        );
        match tokio::time::timeout(timeout, client.model_metadata(request)).await {
            Ok(result) => result.map(tonic::Response::into_inner),
            Err(_) => Err(tonic::Status::deadline_exceeded(format!(
                "metadata request timed out after {timeout:?}"
            ))),
        }
    }

    /// Runs one inference call, bounded by the configured per-call timeout.
    pub async fn model_infer(
        &self,
        request: ModelInferRequest,
    ) -> Result<ModelInferResponse, RuleError> {
        let Mode::Connected {
            client,
            headers,
            timeout,
        } = &self.mode
        else {
            return Err(RuleError::NotStarted);
        };

        let model = request.model_name.clone();
        let mut client = client.clone();
        let request = with_headers(tonic::Request::new(request), headers);
        match tokio::time::timeout(*timeout, client.model_infer(request)).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(RuleError::Rpc { model, status }),
            Err(_) => Err(RuleError::Timeout {
                model,
                timeout: *timeout,
            }),
        }
    }

    /// Drops the channel and lingers briefly so transport teardown can run.
    pub async fn shutdown(self) {
        drop(self.mode);
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
}

/// Normalizes the configured endpoint into a full URI and applies transport
/// options.
fn build_endpoint(config: &GrpcClientConfig) -> Result<Endpoint, ConfigError> {
    let uri = if config.endpoint.contains("://") {
        config.endpoint.clone()
    } else if config.use_ssl {
        format!("https://{}", config.endpoint)
    } else {
        format!("http://{}", config.endpoint)
    };

    let mut endpoint =
        Endpoint::from_shared(uri.clone()).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            error: e.to_string(),
        })?;

    if let Some(keepalive) = &config.keepalive {
        endpoint = endpoint
            .http2_keep_alive_interval(keepalive.time)
            .keep_alive_timeout(keepalive.timeout)
            .keep_alive_while_idle(keepalive.permit_without_stream);
    }

    if config.use_ssl || uri.starts_with("https://") {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                error: e.to_string(),
            })?;
    }

    Ok(endpoint)
}

/// Validates configured headers into typed metadata entries, so malformed
/// values fail at start instead of on every call.
fn parse_headers(
    config: &GrpcClientConfig,
) -> Result<Vec<(AsciiMetadataKey, AsciiMetadataValue)>, ConfigError> {
    config
        .headers
        .iter()
        .map(|(name, value)| {
            let key =
                AsciiMetadataKey::from_str(name).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    error: e.to_string(),
                })?;
            let value =
                AsciiMetadataValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    error: e.to_string(),
                })?;
            Ok((key, value))
        })
        .collect()
}

fn with_headers<T>(
    mut request: tonic::Request<T>,
    headers: &[(AsciiMetadataKey, AsciiMetadataValue)],
) -> tonic::Request<T> {
    for (key, value) in headers {
        let _ = request.metadata_mut().insert(key.clone(), value.clone());
    }
    request
}
