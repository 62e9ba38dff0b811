// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Model signatures discovered from the server's `ModelMetadata` API.
//!
//! Signatures are fetched once at start, for each distinct model across all
//! rules, and cached for the process lifetime. A missing signature is
//! tolerated: validation is skipped and inference attempted anyway.

use otel_infer_kserve::inference::ModelMetadataResponse;
use std::collections::HashMap;
use std::fmt;

/// KServe tensor element types the processor understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    /// BOOL tensors.
    Bool,
    /// INT8 tensors.
    Int8,
    /// INT16 tensors.
    Int16,
    /// INT32 tensors.
    Int32,
    /// INT64 tensors.
    Int64,
    /// UINT8 tensors.
    Uint8,
    /// UINT16 tensors.
    Uint16,
    /// UINT32 tensors.
    Uint32,
    /// UINT64 tensors.
    Uint64,
    /// FP32 tensors.
    Fp32,
    /// FP64 tensors.
    Fp64,
    /// BYTES tensors (decoded as strings, never metricized).
    Bytes,
    /// A dtype string this processor does not recognize. Decoding falls back
    /// to FP64 with a warning.
    Unknown(String),
}

impl ElementType {
    /// Parses a KServe dtype string.
    #[must_use]
    pub fn parse(dtype: &str) -> Self {
        match dtype {
            "BOOL" => ElementType::Bool,
            "INT8" => ElementType::Int8,
            "INT16" => ElementType::Int16,
            "INT32" => ElementType::Int32,
            "INT64" => ElementType::Int64,
            "UINT8" => ElementType::Uint8,
            "UINT16" => ElementType::Uint16,
            "UINT32" => ElementType::Uint32,
            "UINT64" => ElementType::Uint64,
            "FP32" => ElementType::Fp32,
            "FP64" => ElementType::Fp64,
            "BYTES" => ElementType::Bytes,
            other => ElementType::Unknown(other.to_string()),
        }
    }

    /// True for FP32/FP64.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::Fp32 | ElementType::Fp64)
    }

    /// True for the signed and unsigned integer widths.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ElementType::Int8
                | ElementType::Int16
                | ElementType::Int32
                | ElementType::Int64
                | ElementType::Uint8
                | ElementType::Uint16
                | ElementType::Uint32
                | ElementType::Uint64
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementType::Bool => "BOOL",
            ElementType::Int8 => "INT8",
            ElementType::Int16 => "INT16",
            ElementType::Int32 => "INT32",
            ElementType::Int64 => "INT64",
            ElementType::Uint8 => "UINT8",
            ElementType::Uint16 => "UINT16",
            ElementType::Uint32 => "UINT32",
            ElementType::Uint64 => "UINT64",
            ElementType::Fp32 => "FP32",
            ElementType::Fp64 => "FP64",
            ElementType::Bytes => "BYTES",
            ElementType::Unknown(other) => other,
        };
        write!(f, "{label}")
    }
}

/// One tensor slot of a model signature. A `-1` shape dimension means
/// variable size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    /// The tensor name.
    pub name: String,
    /// The element type.
    pub dtype: ElementType,
    /// The declared shape.
    pub shape: Vec<i64>,
}

/// A model's self-described input/output tensor signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelSignature {
    /// Input tensor slots, in call order.
    pub inputs: Vec<TensorSpec>,
    /// Output tensor slots, in response order.
    pub outputs: Vec<TensorSpec>,
}

impl From<&ModelMetadataResponse> for ModelSignature {
    fn from(response: &ModelMetadataResponse) -> Self {
        let convert = |meta: &otel_infer_kserve::inference::model_metadata_response::TensorMetadata| {
            TensorSpec {
                name: meta.name.clone(),
                dtype: ElementType::parse(&meta.datatype),
                shape: meta.shape.clone(),
            }
        };
        ModelSignature {
            inputs: response.inputs.iter().map(convert).collect(),
            outputs: response.outputs.iter().map(convert).collect(),
        }
    }
}

/// Process-wide signature cache, populated at start and read-only afterwards.
#[derive(Debug, Default)]
pub struct SignatureCache {
    signatures: HashMap<String, ModelSignature>,
}

impl SignatureCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a model's signature. Later inserts for the same model are
    /// ignored; the cache is immutable once populated.
    pub fn insert(&mut self, model: &str, signature: ModelSignature) {
        let _ = self
            .signatures
            .entry(model.to_string())
            .or_insert(signature);
    }

    /// Looks up a cached signature.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ModelSignature> {
        self.signatures.get(model)
    }
}
