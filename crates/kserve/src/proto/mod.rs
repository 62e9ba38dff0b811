// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

// Disallow some rustc and clippy lints for the generated code
// (applied to all modules in this file).

#![allow(unused_results)]
#![allow(missing_docs)]
#![allow(unused_qualifications)]
#![allow(clippy::must_use_candidate)]
#![allow(rustdoc::invalid_html_tags)]

#[path = "inference.rs"]
pub mod inference;
