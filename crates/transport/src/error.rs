//! Transport Error Types

use tensor::{DataType, TensorError};
use thiserror::Error;

/// Errors while querying a model's signature
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// Backend could not be reached
    #[error("Backend at {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// Backend does not serve this model or version
    #[error("Model {model} not found: {reason}")]
    ModelNotFound { model: String, reason: String },

    /// Metadata is missing a field or holds an unusable value
    #[error("Invalid metadata for model {model}: {reason}")]
    InvalidMetadata { model: String, reason: String },
}

/// Connectivity and wire-format failures during inference
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Endpoint string is not a usable URI
    #[error("Invalid endpoint {0}")]
    InvalidEndpoint(String),

    /// Connection refused, reset, or otherwise lost
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success status without a backend error payload
    #[error("Unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Requested output absent from the response
    #[error("Response is missing output {0}")]
    MissingOutput(String),

    /// Argument elements differ from the declared input datatype
    #[error("Input {name} declared as {declared}, got {actual}")]
    DatatypeMismatch {
        name: String,
        declared: DataType,
        actual: DataType,
    },

    /// Datatype has no representation on this protocol
    #[error("Unsupported on this transport: {0}")]
    Unsupported(String),

    #[error("Tensor encoding failed: {0}")]
    Tensor(#[from] TensorError),
}

/// The backend accepted the request but model execution failed
#[derive(Debug, Clone, Error)]
#[error("Inference failed for model {model}: {message}")]
pub struct ServerInferenceError {
    pub model: String,
    /// Protocol status (gRPC code name or HTTP status)
    pub status: String,
    pub message: String,
}

/// Failure of one inference round trip
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Server(#[from] ServerInferenceError),
}

impl From<TensorError> for InvokeError {
    fn from(err: TensorError) -> Self {
        InvokeError::Transport(TransportError::Tensor(err))
    }
}
