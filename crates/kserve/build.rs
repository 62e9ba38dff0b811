// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! A build script to generate the KServe v2 gRPC inference API (client and server stubs).

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The gRPC inference API is vendored in `src/proto` to avoid depending
    // on protoc in CI.
    //
    // To regenerate the gRPC API from the proto file:
    // - Uncomment the following lines.
    // - Run `cargo build` to regenerate the API.
    // - Comment the following lines.
    // - Commit the changes.
    // tonic_build::configure()
    //     .out_dir("src/proto")
    //     .compile_protos(&["proto/grpc_predict_v2.proto"], &["proto"])?;
    Ok(())
}
