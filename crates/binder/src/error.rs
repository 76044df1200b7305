//! Binding Error Types

use signature::Dim;
use tensor::DataType;
use thiserror::Error;

/// Arguments that cannot be mapped onto a model's declared inputs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Positional and named arguments in the same call
    #[error("ambiguous or missing arguments: got {positional} positional and {named} named")]
    AmbiguousArguments { positional: usize, named: usize },

    /// No arguments at all
    #[error("ambiguous or missing arguments: at least one input must be supplied")]
    MissingArguments,

    /// Wrong number of arguments
    #[error("arity mismatch: expected {expected} inputs, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Named argument the model does not declare
    #[error("unknown or missing input name: {0} is not an input of this model")]
    UnknownInput(String),

    /// Declared input with no named argument
    #[error("unknown or missing input name: no argument for {0}")]
    MissingInput(String),

    /// Same name given twice in a named call
    #[error("input {0} supplied more than once")]
    DuplicateInput(String),

    /// Strict mode only
    #[error("input {name} declared as {expected}, got {actual}")]
    DatatypeMismatch {
        name: String,
        expected: DataType,
        actual: DataType,
    },

    /// Strict mode only
    #[error("input {name} declared with shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<Dim>,
        actual: Vec<usize>,
    },
}
