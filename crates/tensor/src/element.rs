//! Element Types with a Fixed Wire Layout

use crate::DataType;

/// Rust element types that map one-to-one onto a fixed-width [`DataType`]
pub trait Element: Copy + Send + Sync + 'static {
    /// Datatype this element is sent as
    const DATATYPE: DataType;

    /// Append the little-endian encoding of `self`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode one element from exactly `element_size` bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATATYPE: DataType = DataType::$dt;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_numeric_element! {
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Fp32,
    f64 => Fp64,
}

impl Element for bool {
    const DATATYPE: DataType = DataType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
