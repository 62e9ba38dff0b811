// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of the inference processor against an in-process mock
//! KServe server.

use async_trait::async_trait;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Metric, MetricsData, NumberDataPoint, ResourceMetrics, ScopeMetrics, metric,
    number_data_point,
};
use otel_infer_kserve::inference::grpc_inference_service_server::{
    GrpcInferenceService, GrpcInferenceServiceServer,
};
use otel_infer_kserve::inference::model_metadata_response::TensorMetadata;
use otel_infer_kserve::inference::{
    InferTensorContents, ModelInferRequest, ModelInferResponse, ModelMetadataRequest,
    ModelMetadataResponse, ModelReadyRequest, ModelReadyResponse, ServerLiveRequest,
    ServerLiveResponse, ServerMetadataRequest, ServerMetadataResponse, ServerReadyRequest,
    ServerReadyResponse, model_infer_response::InferOutputTensor,
};
use otel_infer_processor::processor::MetricsConsumer;
use otel_infer_processor::{Config, InferenceProcessor};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// Canned per-model behavior of the mock server.
#[derive(Clone)]
enum ModelBehavior {
    /// Respond with these output tensors.
    Respond(Vec<InferOutputTensor>),
    /// Fail every inference with this status code.
    Fail(tonic::Code),
}

/// Mock model server implementing the generated service trait.
#[derive(Default)]
struct MockModelServer {
    live: bool,
    metadata: HashMap<String, ModelMetadataResponse>,
    behaviors: HashMap<String, ModelBehavior>,
    requests: Arc<Mutex<Vec<ModelInferRequest>>>,
}

impl MockModelServer {
    fn live() -> Self {
        Self {
            live: true,
            ..Default::default()
        }
    }

    fn with_metadata(mut self, model: &str, meta: ModelMetadataResponse) -> Self {
        let _ = self.metadata.insert(model.to_string(), meta);
        self
    }

    fn with_behavior(mut self, model: &str, behavior: ModelBehavior) -> Self {
        let _ = self.behaviors.insert(model.to_string(), behavior);
        self
    }

    fn request_log(&self) -> Arc<Mutex<Vec<ModelInferRequest>>> {
        self.requests.clone()
    }
}

#[tonic::async_trait]
impl GrpcInferenceService for MockModelServer {
    async fn server_live(
        &self,
        _request: Request<ServerLiveRequest>,
    ) -> Result<Response<ServerLiveResponse>, Status> {
        Ok(Response::new(ServerLiveResponse { live: self.live }))
    }

    async fn server_ready(
        &self,
        _request: Request<ServerReadyRequest>,
    ) -> Result<Response<ServerReadyResponse>, Status> {
        Ok(Response::new(ServerReadyResponse { ready: self.live }))
    }

    async fn model_ready(
        &self,
        _request: Request<ModelReadyRequest>,
    ) -> Result<Response<ModelReadyResponse>, Status> {
        Ok(Response::new(ModelReadyResponse { ready: true }))
    }

    async fn server_metadata(
        &self,
        _request: Request<ServerMetadataRequest>,
    ) -> Result<Response<ServerMetadataResponse>, Status> {
        Ok(Response::new(ServerMetadataResponse {
            name: "mock-inference-server".to_string(),
            version: "0.1".to_string(),
            extensions: vec![],
        }))
    }

    async fn model_metadata(
        &self,
        request: Request<ModelMetadataRequest>,
    ) -> Result<Response<ModelMetadataResponse>, Status> {
        let name = request.into_inner().name;
        self.metadata
            .get(&name)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("model `{name}` has no metadata")))
    }

    async fn model_infer(
        &self,
        request: Request<ModelInferRequest>,
    ) -> Result<Response<ModelInferResponse>, Status> {
        let request = request.into_inner();
        let model = request.model_name.clone();
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request);

        match self.behaviors.get(&model) {
            Some(ModelBehavior::Respond(outputs)) => Ok(Response::new(ModelInferResponse {
                model_name: model,
                outputs: outputs.clone(),
                ..Default::default()
            })),
            Some(ModelBehavior::Fail(code)) => {
                Err(Status::new(*code, format!("mock failure for `{model}`")))
            }
            None => Err(Status::not_found(format!("model `{model}` not mocked"))),
        }
    }
}

/// Binds the mock on an unused port and returns the client endpoint. The
/// listener is bound before the server task is spawned so the first probe
/// cannot race the accept loop.
async fn spawn_server(mock: MockModelServer) -> String {
    let port = portpicker::pick_unused_port().expect("no free port");
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("bind mock server");
    let _ = tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(GrpcInferenceServiceServer::new(mock))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    format!("http://{addr}")
}

/// Downstream consumer capturing forwarded batches.
#[derive(Default)]
struct CapturingConsumer {
    batches: Mutex<Vec<MetricsData>>,
}

impl CapturingConsumer {
    fn batches(&self) -> Vec<MetricsData> {
        self.batches.lock().expect("batch log poisoned").clone()
    }
}

#[async_trait]
impl MetricsConsumer for CapturingConsumer {
    async fn consume_metrics(&self, batch: MetricsData) {
        self.batches.lock().expect("batch log poisoned").push(batch);
    }
}

fn attr(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

fn gauge(name: &str, points: Vec<(Vec<KeyValue>, f64)>) -> Metric {
    let data_points = points
        .into_iter()
        .map(|(attributes, value)| NumberDataPoint {
            attributes,
            time_unix_nano: 1_700_000_000_000_000_000,
            value: Some(number_data_point::Value::AsDouble(value)),
            ..Default::default()
        })
        .collect();
    Metric {
        name: name.to_string(),
        data: Some(metric::Data::Gauge(Gauge { data_points })),
        ..Default::default()
    }
}

fn batch(metrics: Vec<Metric>) -> MetricsData {
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

fn fp64_output(name: &str, values: Vec<f64>) -> InferOutputTensor {
    InferOutputTensor {
        name: name.to_string(),
        datatype: "FP64".to_string(),
        shape: vec![values.len() as i64],
        contents: Some(InferTensorContents {
            fp64_contents: values,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn fp64_metadata(model: &str, inputs: Vec<&str>, outputs: Vec<&str>) -> ModelMetadataResponse {
    let tensor = |name: &&str| TensorMetadata {
        name: (*name).to_string(),
        datatype: "FP64".to_string(),
        shape: vec![-1],
    };
    ModelMetadataResponse {
        name: model.to_string(),
        inputs: inputs.iter().map(tensor).collect(),
        outputs: outputs.iter().map(tensor).collect(),
        ..Default::default()
    }
}

fn config(endpoint: &str, rules: serde_json::Value) -> Config {
    Config::from_value(&serde_json::json!({
        "grpc": { "endpoint": endpoint },
        "rules": rules
    }))
    .expect("valid test config")
}

async fn started_processor(
    endpoint: &str,
    rules: serde_json::Value,
) -> (InferenceProcessor, Arc<CapturingConsumer>) {
    let consumer = Arc::new(CapturingConsumer::default());
    let mut processor =
        InferenceProcessor::new(config(endpoint, rules), consumer.clone()).expect("processor");
    processor.start().await.expect("start");
    (processor, consumer)
}

/// Flattened `(metric name, value, attributes)` view of a forwarded batch.
fn flatten(batch: &MetricsData) -> Vec<(String, f64, BTreeMap<String, String>)> {
    let mut out = Vec::new();
    for resource in &batch.resource_metrics {
        for scope in &resource.scope_metrics {
            for metric in &scope.metrics {
                if let Some(metric::Data::Gauge(gauge)) = &metric.data {
                    for dp in &gauge.data_points {
                        let value = match dp.value {
                            Some(number_data_point::Value::AsDouble(d)) => d,
                            Some(number_data_point::Value::AsInt(i)) => i as f64,
                            None => f64::NAN,
                        };
                        let attrs = dp
                            .attributes
                            .iter()
                            .map(|kv| {
                                let v = match kv.value.as_ref().and_then(|v| v.value.as_ref()) {
                                    Some(any_value::Value::StringValue(s)) => s.clone(),
                                    other => format!("{other:?}"),
                                };
                                (kv.key.clone(), v)
                            })
                            .collect();
                        out.push((metric.name.clone(), value, attrs));
                    }
                }
            }
        }
    }
    out
}

// S1 — single-input scaling.
#[tokio::test]
async fn scales_a_single_input_metric() {
    let mock = MockModelServer::live()
        .with_behavior("scale", ModelBehavior::Respond(vec![fp64_output("out", vec![100.0])]));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "scale",
            "inputs": ["cpu.usage"],
            "outputs": [{ "name": "cpu.scaled" }],
            "output_pattern": "{output}"
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![attr("host", "a")], 50.0)])]);
    processor.consume_metrics(input.clone()).await;
    processor.shutdown().await;

    let received = consumer.batches();
    assert_eq!(received.len(), 1);
    let rows = flatten(&received[0]);
    assert_eq!(rows.len(), 2);

    // Pass-through: the original metric is unchanged.
    assert_eq!(rows[0].0, "cpu.usage");
    assert_eq!(rows[0].1, 50.0);

    let (name, value, attrs) = &rows[1];
    assert_eq!(name, "cpu.scaled");
    assert_eq!(*value, 100.0);
    assert_eq!(attrs.get("cpu.usage.host").map(String::as_str), Some("a"));
    assert_eq!(
        attrs.get("otel.inference.model.name").map(String::as_str),
        Some("scale")
    );
    assert!(!attrs.contains_key("otel.inference.model.version"));
}

// S2 — broadcast memory math, with tensor/group/output ordering checked
// end to end.
#[tokio::test]
async fn broadcasts_single_point_input_across_states() {
    let mock = MockModelServer::live().with_behavior(
        "product",
        ModelBehavior::Respond(vec![fp64_output("out", vec![1.6e9, 2.4e9, 4.0e9])]),
    );
    let request_log = mock.request_log();
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "product",
            "inputs": ["mem.util", "mem.limit"],
            "outputs": [{ "name": "mem.product" }]
        }]),
    )
    .await;

    let input = batch(vec![
        gauge(
            "mem.util",
            vec![
                (vec![attr("state", "used")], 0.5),
                (vec![attr("state", "free")], 0.3),
                (vec![attr("state", "cached")], 0.2),
            ],
        ),
        gauge("mem.limit", vec![(vec![], 8e9)]),
    ]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    // The request tensors follow canonical key order: cached, free, used.
    let requests = request_log.lock().expect("request log").clone();
    assert_eq!(requests.len(), 1);
    let util_tensor = &requests[0].inputs[0];
    assert_eq!(util_tensor.name, "mem.util");
    assert_eq!(util_tensor.shape, vec![3]);
    assert_eq!(
        util_tensor.contents.as_ref().expect("contents").fp64_contents,
        vec![0.2, 0.3, 0.5]
    );
    let limit_tensor = &requests[0].inputs[1];
    assert_eq!(
        limit_tensor.contents.as_ref().expect("contents").fp64_contents,
        vec![8e9, 8e9, 8e9]
    );

    // Output points line up with group order and carry namespaced state.
    let rows = flatten(&consumer.batches()[0]);
    let outputs: Vec<_> = rows.iter().filter(|(name, _, _)| name == "mem.product").collect();
    assert_eq!(outputs.len(), 3);
    let expectations = [("cached", 1.6e9), ("free", 2.4e9), ("used", 4.0e9)];
    for ((_, value, attrs), (state, expected)) in outputs.iter().zip(expectations) {
        assert_eq!(*value, expected);
        assert_eq!(attrs.get("mem.util.state").map(String::as_str), Some(state));
        assert_eq!(
            attrs.get("otel.inference.model.name").map(String::as_str),
            Some("product")
        );
    }
}

// S3 — arity mismatch: the rule is skipped, the batch passes through.
#[tokio::test]
async fn arity_mismatch_skips_the_rule() {
    let mock = MockModelServer::live()
        .with_metadata("needs_two", fp64_metadata("needs_two", vec!["a", "b"], vec!["out"]))
        .with_behavior("needs_two", ModelBehavior::Respond(vec![fp64_output("out", vec![1.0])]));
    let request_log = mock.request_log();
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "needs_two",
            "inputs": ["cpu.usage"],
            "outputs": [{ "name": "out" }]
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![], 1.0)])]);
    processor.consume_metrics(input.clone()).await;
    processor.shutdown().await;

    // No inference call was made and only the original metric came through.
    assert!(request_log.lock().expect("request log").is_empty());
    let rows = flatten(&consumer.batches()[0]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "cpu.usage");
}

// S4 — inference failure: inputs forwarded, no outputs appended.
#[tokio::test]
async fn rpc_failure_preserves_inputs_and_drops_outputs() {
    let mock = MockModelServer::live()
        .with_behavior("down", ModelBehavior::Fail(tonic::Code::Unavailable));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "down",
            "inputs": ["cpu.usage"],
            "outputs": [{ "name": "out" }]
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![attr("host", "a")], 1.0)])]);
    processor.consume_metrics(input.clone()).await;
    processor.shutdown().await;

    let received = consumer.batches();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], input);
}

// S5 — two rules sharing a model discover distinct output names.
#[tokio::test]
async fn discovered_outputs_do_not_collide_across_rules() {
    let mock = MockModelServer::live()
        .with_metadata("scaler", fp64_metadata("scaler", vec!["in"], vec!["scaled_value"]))
        .with_behavior("scaler", ModelBehavior::Respond(vec![fp64_output("scaled_value", vec![2.0])]));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([
            { "model_name": "scaler", "inputs": ["cpu.usage"] },
            { "model_name": "scaler", "inputs": ["mem.usage"] }
        ]),
    )
    .await;

    let input = batch(vec![
        gauge("cpu.usage", vec![(vec![], 1.0)]),
        gauge("mem.usage", vec![(vec![], 2.0)]),
    ]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let rows = flatten(&consumer.batches()[0]);
    let names: Vec<&str> = rows.iter().map(|(name, _, _)| name.as_str()).collect();
    assert!(names.contains(&"cpu_usage.scaled_value"));
    assert!(names.contains(&"mem_usage.scaled_value"));
}

// S6 — label-selector filtering limits which points reach the model.
#[tokio::test]
async fn selector_filters_points_before_inference() {
    let mock = MockModelServer::live()
        .with_behavior("scale", ModelBehavior::Respond(vec![fp64_output("out", vec![9.0])]));
    let request_log = mock.request_log();
    let endpoint = spawn_server(mock).await;

    let (mut processor, _consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "scale",
            "inputs": [r#"mem.bytes{state="used"}"#],
            "outputs": [{ "name": "out" }]
        }]),
    )
    .await;

    let input = batch(vec![gauge(
        "mem.bytes",
        vec![
            (vec![attr("state", "used")], 100.0),
            (vec![attr("state", "free")], 50.0),
            (vec![attr("state", "cached")], 25.0),
        ],
    )]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let requests = request_log.lock().expect("request log").clone();
    assert_eq!(requests.len(), 1);
    let tensor = &requests[0].inputs[0];
    assert_eq!(tensor.name, "mem.bytes");
    assert_eq!(
        tensor.contents.as_ref().expect("contents").fp64_contents,
        vec![100.0]
    );
}

#[tokio::test]
async fn dead_server_fails_start() {
    let mock = MockModelServer {
        live: false,
        ..Default::default()
    };
    let endpoint = spawn_server(mock).await;

    let consumer = Arc::new(CapturingConsumer::default());
    let mut processor = InferenceProcessor::new(
        config(&endpoint, serde_json::json!([])),
        consumer,
    )
    .expect("processor");
    let err = processor.start().await.expect_err("start must fail");
    assert!(err.to_string().contains("live"));
}

#[tokio::test]
async fn metadata_absence_is_tolerated_with_declared_outputs() {
    // No metadata registered for the model, but the rule declares its
    // outputs, so inference proceeds unvalidated.
    let mock = MockModelServer::live()
        .with_behavior("opaque", ModelBehavior::Respond(vec![fp64_output("out", vec![3.0])]));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "opaque",
            "inputs": ["cpu.usage"],
            "outputs": [{ "name": "cpu.opaque" }]
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![], 1.0)])]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let rows = flatten(&consumer.batches()[0]);
    assert!(rows.iter().any(|(name, value, _)| name == "cpu.opaque" && *value == 3.0));
}

#[tokio::test]
async fn failing_rule_does_not_block_other_rules() {
    let mock = MockModelServer::live()
        .with_behavior("down", ModelBehavior::Fail(tonic::Code::Internal))
        .with_behavior("up", ModelBehavior::Respond(vec![fp64_output("out", vec![7.0])]));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([
            { "model_name": "down", "inputs": ["cpu.usage"], "outputs": [{ "name": "a" }] },
            { "model_name": "up", "inputs": ["cpu.usage"], "outputs": [{ "name": "b" }] }
        ]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![], 1.0)])]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let rows = flatten(&consumer.batches()[0]);
    let names: Vec<&str> = rows.iter().map(|(name, _, _)| name.as_str()).collect();
    assert!(!names.contains(&"a"));
    assert!(names.contains(&"b"));
}

#[tokio::test]
async fn missing_input_skips_rule_but_forwards_batch() {
    let mock = MockModelServer::live();
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "m",
            "inputs": ["not.present"],
            "outputs": [{ "name": "out" }]
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![], 1.0)])]);
    processor.consume_metrics(input.clone()).await;
    processor.shutdown().await;

    assert_eq!(consumer.batches()[0], input);
}

#[tokio::test]
async fn each_resource_is_processed_independently() {
    let mock = MockModelServer::live()
        .with_behavior("scale", ModelBehavior::Respond(vec![fp64_output("out", vec![5.0])]));
    let request_log = mock.request_log();
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "scale",
            "inputs": ["cpu.usage"],
            "outputs": [{ "name": "cpu.scaled" }]
        }]),
    )
    .await;

    // Two resources, each carrying its own cpu.usage.
    let input = MetricsData {
        resource_metrics: vec![
            ResourceMetrics {
                scope_metrics: vec![ScopeMetrics {
                    metrics: vec![gauge("cpu.usage", vec![(vec![attr("host", "a")], 1.0)])],
                    ..Default::default()
                }],
                ..Default::default()
            },
            ResourceMetrics {
                scope_metrics: vec![ScopeMetrics {
                    metrics: vec![gauge("cpu.usage", vec![(vec![attr("host", "b")], 2.0)])],
                    ..Default::default()
                }],
                ..Default::default()
            },
        ],
    };
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    // One inference per resource, and each resource received its own copy
    // of the synthesized metric.
    assert_eq!(request_log.lock().expect("request log").len(), 2);
    let received = consumer.batches();
    for (resource, host) in received[0].resource_metrics.iter().zip(["a", "b"]) {
        let scope = &resource.scope_metrics[0];
        let names: Vec<&str> = scope.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cpu.usage", "cpu.scaled"]);
        let Some(metric::Data::Gauge(gauge)) = &scope.metrics[1].data else {
            panic!("expected a gauge");
        };
        let attrs = &gauge.data_points[0].attributes;
        assert!(attrs.iter().any(|kv| {
            kv.key == "cpu.usage.host"
                && matches!(
                    kv.value.as_ref().and_then(|v| v.value.as_ref()),
                    Some(any_value::Value::StringValue(s)) if s == host
                )
        }));
    }
}

#[tokio::test]
async fn outputs_land_in_the_primary_input_scope() {
    let mock = MockModelServer::live()
        .with_behavior("scale", ModelBehavior::Respond(vec![fp64_output("out", vec![5.0])]));
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "scale",
            "inputs": ["app.latency"],
            "outputs": [{ "name": "app.latency.scaled" }]
        }]),
    )
    .await;

    // The input metric lives in the second scope; the output must follow it.
    let input = MetricsData {
        resource_metrics: vec![ResourceMetrics {
            scope_metrics: vec![
                ScopeMetrics {
                    metrics: vec![gauge("unrelated", vec![(vec![], 0.0)])],
                    ..Default::default()
                },
                ScopeMetrics {
                    metrics: vec![gauge("app.latency", vec![(vec![], 9.0)])],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
    };
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let received = consumer.batches();
    let scopes = &received[0].resource_metrics[0].scope_metrics;
    assert_eq!(scopes[0].metrics.len(), 1);
    let names: Vec<&str> = scopes[1].metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["app.latency", "app.latency.scaled"]);
}

#[tokio::test]
async fn output_index_out_of_range_skips_only_that_output() {
    let mock = MockModelServer::live().with_behavior(
        "multi",
        ModelBehavior::Respond(vec![fp64_output("first", vec![1.0])]),
    );
    let endpoint = spawn_server(mock).await;

    let (mut processor, consumer) = started_processor(
        &endpoint,
        serde_json::json!([{
            "model_name": "multi",
            "inputs": ["cpu.usage"],
            "outputs": [
                { "name": "good", "output_index": 0 },
                { "name": "bad", "output_index": 9 }
            ]
        }]),
    )
    .await;

    let input = batch(vec![gauge("cpu.usage", vec![(vec![], 1.0)])]);
    processor.consume_metrics(input).await;
    processor.shutdown().await;

    let rows = flatten(&consumer.batches()[0]);
    let names: Vec<&str> = rows.iter().map(|(name, _, _)| name.as_str()).collect();
    assert!(names.contains(&"good"));
    assert!(!names.contains(&"bad"));
}
