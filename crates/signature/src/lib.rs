//! Model Signatures
//!
//! The named, typed, shaped contract a served model exposes for its inputs and
//! outputs, normalized from whichever wire protocol reported it.

mod descriptor;
mod error;
mod model;

pub use descriptor::{Dim, SignatureDescriptor};
pub use error::SignatureError;
pub use model::{BackendKind, ModelRef, ModelSignature};

pub use tensor::DataType;
