//! Tensor Buffer

use crate::{DataType, Element, TensorError};
use bytes::{BufMut, Bytes, BytesMut};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};

/// A shaped, typed, contiguous little-endian buffer
///
/// This is the unit that crosses the wire. The datatype is the datatype of the
/// stored elements; nothing reinterprets a buffer as another element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    datatype: DataType,
    shape: Vec<usize>,
    data: Bytes,
}

impl Tensor {
    /// Wrap a raw buffer, checking its length against shape and datatype
    ///
    /// `BYTES` buffers must hold exactly `product(shape)` length-prefixed
    /// entries.
    pub fn from_raw(
        datatype: DataType,
        shape: Vec<usize>,
        data: impl Into<Bytes>,
    ) -> Result<Self, TensorError> {
        let data = data.into();
        let count = checked_element_count(&shape)?;

        match datatype.element_size() {
            Some(size) => {
                let expected = count
                    .checked_mul(size)
                    .ok_or_else(|| TensorError::ShapeOverflow(shape.clone()))?;
                if data.len() != expected {
                    return Err(TensorError::BufferSize {
                        datatype,
                        shape,
                        expected,
                        actual: data.len(),
                    });
                }
            }
            None => {
                let entries = split_bytes(&data)?.len();
                if entries != count {
                    return Err(TensorError::ElementCount {
                        shape,
                        expected: count,
                        actual: entries,
                    });
                }
            }
        }

        Ok(Self {
            datatype,
            shape,
            data,
        })
    }

    /// Build from any `ndarray` array, in logical (row-major) order
    pub fn from_array<T, S, D>(array: &ArrayBase<S, D>) -> Self
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let shape = array.shape().to_vec();
        let mut data = Vec::with_capacity(array.len() * T::DATATYPE.element_size().unwrap_or(1));
        for value in array.iter() {
            value.write_le(&mut data);
        }

        Self {
            datatype: T::DATATYPE,
            shape,
            data: Bytes::from(data),
        }
    }

    /// Build from a flat row-major vector
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self, TensorError> {
        let expected = checked_element_count(&shape)?;
        if values.len() != expected {
            return Err(TensorError::ElementCount {
                shape,
                expected,
                actual: values.len(),
            });
        }

        let mut data = Vec::with_capacity(values.len() * T::DATATYPE.element_size().unwrap_or(1));
        for value in values {
            value.write_le(&mut data);
        }

        Ok(Self {
            datatype: T::DATATYPE,
            shape,
            data: Bytes::from(data),
        })
    }

    /// Build a `BYTES` tensor from byte strings
    pub fn from_strings<I, B>(shape: Vec<usize>, values: I) -> Result<Self, TensorError>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut data = BytesMut::new();
        let mut count = 0usize;
        for value in values {
            let value = value.as_ref();
            data.put_u32_le(value.len() as u32);
            data.put_slice(value);
            count += 1;
        }

        let expected = checked_element_count(&shape)?;
        if count != expected {
            return Err(TensorError::ElementCount {
                shape,
                expected,
                actual: count,
            });
        }

        Ok(Self {
            datatype: DataType::Bytes,
            shape,
            data: data.freeze(),
        })
    }

    /// Element datatype
    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Concrete shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw little-endian buffer
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume into the raw buffer
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Number of elements (product of the shape)
    pub fn element_count(&self) -> usize {
        element_count(&self.shape)
    }

    /// Size of the raw buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Copy out as a flat row-major vector
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, TensorError> {
        if self.datatype != T::DATATYPE {
            return Err(TensorError::DatatypeMismatch {
                requested: T::DATATYPE,
                actual: self.datatype,
            });
        }

        let size = self.datatype.element_size().unwrap_or(1);
        Ok(self.data.chunks_exact(size).map(T::read_le).collect())
    }

    /// Copy out as a dynamic-rank `ndarray` array
    pub fn to_array<T: Element>(&self) -> Result<ArrayD<T>, TensorError> {
        let values = self.to_vec::<T>()?;
        let actual = values.len();
        ArrayD::from_shape_vec(IxDyn(&self.shape), values).map_err(|_| {
            TensorError::ElementCount {
                shape: self.shape.clone(),
                expected: self.element_count(),
                actual,
            }
        })
    }

    /// Split a `BYTES` tensor into its entries
    pub fn to_strings(&self) -> Result<Vec<Bytes>, TensorError> {
        if self.datatype != DataType::Bytes {
            return Err(TensorError::DatatypeMismatch {
                requested: DataType::Bytes,
                actual: self.datatype,
            });
        }
        split_bytes(&self.data)
    }
}

impl<T, S, D> From<&ArrayBase<S, D>> for Tensor
where
    T: Element,
    S: Data<Elem = T>,
    D: Dimension,
{
    fn from(array: &ArrayBase<S, D>) -> Self {
        Tensor::from_array(array)
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Element count of an untrusted shape
fn checked_element_count(shape: &[usize]) -> Result<usize, TensorError> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| TensorError::ShapeOverflow(shape.to_vec()))
}

/// Split a buffer of 4-byte little-endian length prefixed entries
fn split_bytes(data: &Bytes) -> Result<Vec<Bytes>, TensorError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        if data.len() - offset < 4 {
            return Err(TensorError::MalformedBytes(format!(
                "truncated length prefix at offset {}",
                offset
            )));
        }
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&data[offset..offset + 4]);
        let len = u32::from_le_bytes(prefix) as usize;
        offset += 4;

        if data.len() - offset < len {
            return Err(TensorError::MalformedBytes(format!(
                "entry of {} bytes overruns buffer at offset {}",
                len, offset
            )));
        }
        entries.push(data.slice(offset..offset + len));
        offset += len;
    }

    Ok(entries)
}
