//! Element Datatypes

use crate::TensorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element datatypes understood by the serving backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    /// IEEE 754 half precision
    Fp16,
    Fp32,
    Fp64,
    /// Brain floating point
    Bf16,
    /// Variable-length byte strings
    Bytes,
}

impl DataType {
    /// Get the wire token for this datatype
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Uint8 => "UINT8",
            DataType::Uint16 => "UINT16",
            DataType::Uint32 => "UINT32",
            DataType::Uint64 => "UINT64",
            DataType::Int8 => "INT8",
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Fp16 => "FP16",
            DataType::Fp32 => "FP32",
            DataType::Fp64 => "FP64",
            DataType::Bf16 => "BF16",
            DataType::Bytes => "BYTES",
        }
    }

    /// Size of one element in bytes, `None` for variable-width `BYTES`
    pub fn element_size(&self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Uint8 | DataType::Int8 => Some(1),
            DataType::Uint16 | DataType::Int16 | DataType::Fp16 | DataType::Bf16 => Some(2),
            DataType::Uint32 | DataType::Int32 | DataType::Fp32 => Some(4),
            DataType::Uint64 | DataType::Int64 | DataType::Fp64 => Some(8),
            DataType::Bytes => None,
        }
    }

    /// Check if elements are floating point
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            DataType::Fp16 | DataType::Fp32 | DataType::Fp64 | DataType::Bf16
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Model configs spell types as TYPE_FP32
        let token = s.strip_prefix("TYPE_").unwrap_or(s);
        match token {
            "BOOL" => Ok(DataType::Bool),
            "UINT8" => Ok(DataType::Uint8),
            "UINT16" => Ok(DataType::Uint16),
            "UINT32" => Ok(DataType::Uint32),
            "UINT64" => Ok(DataType::Uint64),
            "INT8" => Ok(DataType::Int8),
            "INT16" => Ok(DataType::Int16),
            "INT32" => Ok(DataType::Int32),
            "INT64" => Ok(DataType::Int64),
            "FP16" => Ok(DataType::Fp16),
            "FP32" => Ok(DataType::Fp32),
            "FP64" => Ok(DataType::Fp64),
            "BF16" => Ok(DataType::Bf16),
            "BYTES" | "STRING" => Ok(DataType::Bytes),
            _ => Err(TensorError::UnknownDatatype(s.to_string())),
        }
    }
}
