// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Streaming metrics→tensor→metrics inference processor.
//!
//! The processor sits in a telemetry pipeline, intercepts batches of numeric
//! time-series metrics, routes selected metrics through remote ML model
//! servers speaking the KServe v2 gRPC inference protocol, and splices the
//! model outputs back into the batch as new metrics whose attributes reflect
//! the input dimensions that produced them.
//!
//! See [`processor::InferenceProcessor`] for the entry point and
//! [`config::Config`] for the configuration surface.

/// gRPC client for the model server, with lifecycle and per-call deadlines.
pub mod client;
/// Configuration types.
pub mod config;
/// Error types.
pub mod error;
/// The broadcast matcher producing aligned data-point groups.
pub mod matcher;
/// Model signatures and the start-time metadata cache.
pub mod metadata;
/// Output metric naming.
pub mod naming;
/// OTLP pdata helpers.
pub mod pdata;
/// The processor orchestrator and downstream consumer contract.
pub mod processor;
/// Rule compilation and metadata reconciliation.
pub mod rules;
/// Label selector parsing and matching.
pub mod selector;
/// Pre-inference signature validation.
pub mod signature;
/// Output synthesis and provenance labeling.
pub mod synthesizer;
/// Tensor encode/decode.
pub mod tensor;

#[cfg(test)]
mod fixtures;

pub use config::{Config, PASSTHROUGH_ENDPOINT};
pub use processor::{InferenceProcessor, MetricsConsumer};
