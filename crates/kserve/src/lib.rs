// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Vendored KServe v2 open inference protocol (`inference.GRPCInferenceService`).
//!
//! The gRPC API is generated once from `proto/grpc_predict_v2.proto` and
//! committed under `src/proto` so that building the workspace does not
//! require protoc. See `build.rs` for the regeneration procedure.

/// Generated protobuf files
pub mod proto;

pub use proto::inference;
