//! Build script for the transport crate
//!
//! Generates the KServe v2 `inference.GRPCInferenceService` client and server
//! from hand-written prost messages, so no protoc is needed.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let codec_path = "tonic::codec::ProstCodec";
    let method = |name: &str, route: &str, input: &str, output: &str| {
        tonic_build::manual::Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::grpc::proto::{}", input))
            .output_type(format!("crate::grpc::proto::{}", output))
            .codec_path(codec_path)
            .build()
    };

    let service = tonic_build::manual::Service::builder()
        .name("GRPCInferenceService")
        .package("inference")
        .comment("KServe v2 inference protocol")
        .method(method(
            "server_ready",
            "ServerReady",
            "ServerReadyRequest",
            "ServerReadyResponse",
        ))
        .method(method(
            "model_metadata",
            "ModelMetadata",
            "ModelMetadataRequest",
            "ModelMetadataResponse",
        ))
        .method(method(
            "model_infer",
            "ModelInfer",
            "ModelInferRequest",
            "ModelInferResponse",
        ))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
