//! Signature Error Types

use thiserror::Error;

/// Errors while assembling a model signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Two descriptors on the same side share a name
    #[error("Duplicate {side} name: {name}")]
    DuplicateName { side: &'static str, name: String },

    /// Descriptor with an empty name
    #[error("Empty {side} name at position {index}")]
    EmptyName { side: &'static str, index: usize },
}
