//! Error Types

use crate::BoxError;
use binder::BindingError;
use tensor::TensorError;
use thiserror::Error;
use transport::{InvokeError, ResolutionError, ServerInferenceError, TransportError};

/// Any failure of a remote function, from construction to returned outputs
///
/// A failed call never yields partial outputs.
#[derive(Debug, Error)]
pub enum Error {
    /// Signature could not be resolved when the function was built
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Arguments do not fit the declared inputs; nothing was sent
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Backend accepted the request but the model failed
    #[error(transparent)]
    ServerInference(#[from] ServerInferenceError),

    /// A processing hook changed the number of values
    #[error("{stage} returned {actual} values, expected {expected}")]
    Processing {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A processing hook failed
    #[error("{stage} failed: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Caller-side array conversion failed
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl From<InvokeError> for Error {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Transport(e) => Error::Transport(e),
            InvokeError::Server(e) => Error::ServerInference(e),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
