//! Signature Descriptor

use serde::{Deserialize, Serialize};
use std::fmt;
use tensor::DataType;

/// One dimension of a declared shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// Known at model load time
    Fixed(usize),
    /// Resolved from the argument at bind time
    Dynamic,
}

impl Dim {
    /// Map a metadata dimension; any negative value is dynamic
    pub fn from_metadata(value: i64) -> Self {
        if value < 0 {
            Dim::Dynamic
        } else {
            Dim::Fixed(value as usize)
        }
    }

    /// Metadata form of this dimension (`-1` for dynamic)
    pub fn to_metadata(self) -> i64 {
        match self {
            Dim::Fixed(n) => n as i64,
            Dim::Dynamic => -1,
        }
    }

    /// Check if a concrete size satisfies this dimension
    pub fn accepts(self, size: usize) -> bool {
        match self {
            Dim::Fixed(n) => n == size,
            Dim::Dynamic => true,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_metadata())
    }
}

/// Name, datatype and shape of one model input or output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureDescriptor {
    pub name: String,
    pub datatype: DataType,
    pub shape: Vec<Dim>,
}

impl SignatureDescriptor {
    /// Create a new descriptor
    pub fn new(name: impl Into<String>, datatype: DataType, shape: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            datatype,
            shape,
        }
    }

    /// Create a descriptor from metadata dimensions
    pub fn from_metadata(name: impl Into<String>, datatype: DataType, dims: &[i64]) -> Self {
        Self::new(
            name,
            datatype,
            dims.iter().copied().map(Dim::from_metadata).collect(),
        )
    }

    /// Declared rank
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Check if any dimension is dynamic
    pub fn is_dynamic(&self) -> bool {
        self.shape.iter().any(|d| *d == Dim::Dynamic)
    }

    /// Check if a runtime shape satisfies the declared one
    pub fn accepts_shape(&self, shape: &[usize]) -> bool {
        self.shape.len() == shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(dim, &size)| dim.accepts(size))
    }
}

impl fmt::Display for SignatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        write!(f, "{}: {}[{}]", self.name, self.datatype, dims.join(", "))
    }
}
