//! Inference Transports
//!
//! One capability interface, [`InferenceBackend`], over the two protocol
//! bindings a serving backend exposes:
//! - gRPC (`inference.GRPCInferenceService`, binary tensor payloads)
//! - HTTP/JSON (`/v2/models/{name}/...`)
//!
//! Both resolve a model's metadata into a [`ModelSignature`] and submit a
//! [`BoundRequest`], returning outputs in the requested order. Neither retries.

mod error;
pub mod grpc;
pub mod http;
mod metadata;

pub use error::{InvokeError, ResolutionError, ServerInferenceError, TransportError};
pub use grpc::GrpcBackend;
pub use http::HttpBackend;
pub use metadata::{normalize_metadata, RawModelMetadata, TensorMetadata};

use async_trait::async_trait;
use binder::{BoundRequest, Placeholder};
use serde::{Deserialize, Serialize};
use signature::{ModelRef, ModelSignature};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tensor::Tensor;

/// Default gRPC endpoint of a local serving backend
pub const DEFAULT_GRPC_ENDPOINT: &str = "localhost:8001";

/// Default HTTP endpoint of a local serving backend
pub const DEFAULT_HTTP_ENDPOINT: &str = "localhost:8000";

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on a single gRPC message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Wire protocol used to reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Binary gRPC binding
    #[default]
    Grpc,
    /// JSON over HTTP binding
    Http,
}

impl Protocol {
    /// Endpoint used when none is configured
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Protocol::Grpc => DEFAULT_GRPC_ENDPOINT,
            Protocol::Http => DEFAULT_HTTP_ENDPOINT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grpc" => Ok(Protocol::Grpc),
            "http" => Ok(Protocol::Http),
            other => Err(format!("unknown protocol {} (expected grpc or http)", other)),
        }
    }
}

/// Connection settings for one backend
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Wire protocol, which also picks the default endpoint
    pub protocol: Protocol,
    /// `host:port` or a full URI; protocol default when `None`
    pub endpoint: Option<String>,
    /// Deadline for establishing the connection
    pub connect_timeout: Duration,
    /// Per-request deadline; none by default
    pub request_timeout: Option<Duration>,
    /// Largest gRPC message accepted or sent
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Grpc,
            endpoint: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl TransportConfig {
    /// Settings for a protocol with its default endpoint
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }

    /// Override the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Endpoint as a URI with scheme
    pub fn endpoint_uri(&self) -> String {
        let raw = self
            .endpoint
            .as_deref()
            .unwrap_or_else(|| self.protocol.default_endpoint());
        normalize_endpoint(raw)
    }
}

/// Capability set of a serving backend
///
/// Implementations hold no per-call state and are safe to share across
/// concurrent invocations.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Protocol this backend speaks
    fn protocol(&self) -> Protocol;

    /// Endpoint URI
    fn endpoint(&self) -> &str;

    /// Ask the server whether it is ready for inference
    async fn is_ready(&self) -> Result<bool, TransportError>;

    /// Query and normalize a model's input/output signature
    async fn resolve_metadata(&self, model: &ModelRef) -> Result<ModelSignature, ResolutionError>;

    /// Submit one bound request and return outputs in `output_names` order
    async fn invoke(
        &self,
        model: &ModelRef,
        request: BoundRequest,
        output_names: &[String],
    ) -> Result<Vec<Tensor>, InvokeError>;
}

/// Build the backend selected by `config.protocol`
///
/// The gRPC channel connects lazily, so this must run inside a tokio runtime
/// but performs no I/O.
pub fn connect(config: &TransportConfig) -> Result<Arc<dyn InferenceBackend>, TransportError> {
    match config.protocol {
        Protocol::Grpc => Ok(Arc::new(GrpcBackend::new(config)?)),
        Protocol::Http => Ok(Arc::new(HttpBackend::new(config)?)),
    }
}

/// Prepend `http://` when no scheme is given and drop trailing slashes
pub fn normalize_endpoint(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    }
}

/// Refuse to send elements of a type other than the declared one
pub(crate) fn check_datatype(placeholder: &Placeholder) -> Result<(), TransportError> {
    if placeholder.datatype_matches() {
        Ok(())
    } else {
        Err(TransportError::DatatypeMismatch {
            name: placeholder.name.clone(),
            declared: placeholder.datatype,
            actual: placeholder.tensor.datatype(),
        })
    }
}

/// Pick received outputs in the order they were requested
pub(crate) fn order_outputs(
    output_names: &[String],
    mut received: HashMap<String, Tensor>,
) -> Result<Vec<Tensor>, TransportError> {
    output_names
        .iter()
        .map(|name| {
            received
                .remove(name)
                .ok_or_else(|| TransportError::MissingOutput(name.clone()))
        })
        .collect()
}
