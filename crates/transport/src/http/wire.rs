//! HTTP/JSON wire format
//!
//! Request and response bodies of `/v2/models/{name}/infer`, plus conversion
//! between [`Tensor`] buffers and JSON `data` arrays.

use crate::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tensor::{DataType, Element, Tensor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub inputs: Vec<JsonTensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RequestedOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedOutput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferResponseBody {
    #[serde(default)]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub outputs: Vec<JsonTensor>,
}

/// Input or output tensor with its elements as a JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub datatype: String,
    pub data: Value,
}

/// Body the backend returns with a failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl JsonTensor {
    /// Encode a tensor under `name`, elements flattened in row-major order
    pub fn from_tensor(name: impl Into<String>, tensor: &Tensor) -> Result<Self, TransportError> {
        let name = name.into();
        let data = tensor_to_json(&name, tensor)?;
        Ok(Self {
            name,
            shape: tensor.shape().to_vec(),
            datatype: tensor.datatype().as_str().to_string(),
            data,
        })
    }

    /// Decode into a tensor, accepting flat or nested `data`
    pub fn to_tensor(&self) -> Result<Tensor, TransportError> {
        let datatype: DataType = self.datatype.parse().map_err(|_| {
            TransportError::MalformedResponse(format!(
                "tensor {} has unknown datatype {}",
                self.name, self.datatype
            ))
        })?;
        json_to_tensor(&self.name, datatype, self.shape.clone(), &self.data)
    }
}

/// Flat JSON array of a tensor's elements
pub fn tensor_to_json(name: &str, tensor: &Tensor) -> Result<Value, TransportError> {
    fn array<T: Element + Into<Value>>(tensor: &Tensor) -> Result<Value, TransportError> {
        Ok(Value::Array(
            tensor.to_vec::<T>()?.into_iter().map(Into::into).collect(),
        ))
    }

    fn floats(name: &str, values: Vec<f64>) -> Result<Value, TransportError> {
        values
            .into_iter()
            .map(|v| {
                serde_json::Number::from_f64(v).map(Value::Number).ok_or_else(|| {
                    TransportError::Unsupported(format!("{} holds non-finite value {}", name, v))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    match tensor.datatype() {
        DataType::Bool => array::<bool>(tensor),
        DataType::Uint8 => array::<u8>(tensor),
        DataType::Uint16 => array::<u16>(tensor),
        DataType::Uint32 => array::<u32>(tensor),
        DataType::Uint64 => array::<u64>(tensor),
        DataType::Int8 => array::<i8>(tensor),
        DataType::Int16 => array::<i16>(tensor),
        DataType::Int32 => array::<i32>(tensor),
        DataType::Int64 => array::<i64>(tensor),
        DataType::Fp32 => floats(
            name,
            tensor.to_vec::<f32>()?.into_iter().map(f64::from).collect(),
        ),
        DataType::Fp64 => floats(name, tensor.to_vec::<f64>()?),
        DataType::Bytes => tensor
            .to_strings()?
            .into_iter()
            .map(|entry| {
                String::from_utf8(entry.to_vec()).map(Value::String).map_err(|_| {
                    TransportError::Unsupported(format!("{} holds a non-UTF-8 BYTES element", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        dt @ (DataType::Fp16 | DataType::Bf16) => Err(TransportError::Unsupported(format!(
            "{} is {}, which has no JSON representation",
            name, dt
        ))),
    }
}

/// Tensor from a flat or nested JSON array
pub fn json_to_tensor(
    name: &str,
    datatype: DataType,
    shape: Vec<usize>,
    data: &Value,
) -> Result<Tensor, TransportError> {
    let mut flat = Vec::new();
    flatten(data, &mut flat);

    let malformed = |expected: &str| {
        TransportError::MalformedResponse(format!("{} holds a value that is not {}", name, expected))
    };

    macro_rules! collect {
        ($ty:ty, $convert:expr, $what:expr) => {{
            let convert = $convert;
            let values = flat
                .iter()
                .map(|v| convert(*v).ok_or_else(|| malformed($what)))
                .collect::<Result<Vec<$ty>, _>>()?;
            Tensor::from_vec(shape, values)?
        }};
    }

    let tensor = match datatype {
        DataType::Bool => collect!(bool, Value::as_bool, "a boolean"),
        DataType::Uint8 => collect!(u8, |v: &Value| narrow(v.as_u64()), "a UINT8"),
        DataType::Uint16 => collect!(u16, |v: &Value| narrow(v.as_u64()), "a UINT16"),
        DataType::Uint32 => collect!(u32, |v: &Value| narrow(v.as_u64()), "a UINT32"),
        DataType::Uint64 => collect!(u64, Value::as_u64, "a UINT64"),
        DataType::Int8 => collect!(i8, |v: &Value| narrow(v.as_i64()), "an INT8"),
        DataType::Int16 => collect!(i16, |v: &Value| narrow(v.as_i64()), "an INT16"),
        DataType::Int32 => collect!(i32, |v: &Value| narrow(v.as_i64()), "an INT32"),
        DataType::Int64 => collect!(i64, Value::as_i64, "an INT64"),
        DataType::Fp32 => collect!(f32, |v: &Value| v.as_f64().map(|f| f as f32), "a number"),
        DataType::Fp64 => collect!(f64, Value::as_f64, "a number"),
        DataType::Bytes => {
            let values = flat
                .iter()
                .map(|v| v.as_str().ok_or_else(|| malformed("a string")))
                .collect::<Result<Vec<_>, _>>()?;
            Tensor::from_strings(shape, values)?
        }
        DataType::Fp16 | DataType::Bf16 => {
            return Err(TransportError::Unsupported(format!(
                "{} is {}, which has no JSON representation",
                name, datatype
            )))
        }
    };

    Ok(tensor)
}

fn narrow<S, T: TryFrom<S>>(value: Option<S>) -> Option<T> {
    value.and_then(|v| T::try_from(v).ok())
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        other => out.push(other),
    }
}
