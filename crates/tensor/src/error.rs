//! Tensor Error Types

use crate::DataType;
use thiserror::Error;

/// Errors while building or reading tensors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    /// Datatype token not in the backend vocabulary
    #[error("Unknown datatype: {0}")]
    UnknownDatatype(String),

    /// Buffer length does not match shape and element size
    #[error("Buffer of {actual} bytes does not fit shape {shape:?} of {datatype} (expected {expected} bytes)")]
    BufferSize {
        datatype: DataType,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Element count does not match shape
    #[error("Shape {shape:?} holds {expected} elements, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Requested element type differs from the tensor's datatype
    #[error("Tensor holds {actual} elements, requested {requested}")]
    DatatypeMismatch {
        requested: DataType,
        actual: DataType,
    },

    /// Shape or byte size does not fit in `usize`
    #[error("Shape {0:?} is too large to address")]
    ShapeOverflow(Vec<usize>),

    /// Malformed length-prefixed BYTES buffer
    #[error("Malformed BYTES buffer: {0}")]
    MalformedBytes(String),
}
