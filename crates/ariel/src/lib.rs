//! Ariel
//!
//! Wraps a model served by a remote inference server in a local callable.
//! Construction resolves the model's signature once; each call binds the
//! arguments against it, performs one round trip over gRPC or HTTP/JSON and
//! returns the outputs in declared order.
//!
//! ```no_run
//! # async fn run() -> Result<(), ariel::Error> {
//! use ariel::{ArielConfig, RemoteFunction, Tensor};
//!
//! let add_sub = RemoteFunction::builder("py_model")
//!     .config(ArielConfig::default())
//!     .build()
//!     .await?;
//!
//! let a = Tensor::from_vec(vec![4], vec![1.0f32, 2.0, 3.0, 4.0])?;
//! let b = Tensor::from_vec(vec![4], vec![5.0f32, 6.0, 7.0, 8.0])?;
//! let outputs = add_sub.call_positional(vec![a, b]).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod function;
mod logging;

pub use config::{ArielConfig, LogFormat};
pub use error::Error;
pub use function::{
    function_from_model, get_inputs, get_outputs, BoxError, Processor, RemoteFunction,
    RemoteFunctionBuilder,
};
pub use logging::init_logging;

pub use binder::{Arguments, BindOptions, BindingError, CallArgs};
pub use signature::{BackendKind, DataType, Dim, ModelRef, ModelSignature, SignatureDescriptor};
pub use tensor::{Tensor, TensorError};
pub use transport::{
    InferenceBackend, Protocol, ResolutionError, ServerInferenceError, TransportConfig,
    TransportError,
};
