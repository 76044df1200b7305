//! Tensor Marshalling
//!
//! Native arrays as the inference server sees them: an element datatype, a
//! concrete shape and a raw little-endian byte buffer. Conversions to and from
//! `ndarray` never cast between element types.

mod datatype;
mod element;
mod error;
mod tensor;

pub use datatype::DataType;
pub use element::Element;
pub use error::TensorError;
pub use tensor::Tensor;
