//! Session variable codec
//!
//! Session data is stored by the platform as named raw byte buffers with no
//! schema. This module converts typed values to and from those buffers:
//! fixed-width values are little-endian, `char` is a single UTF-16 code unit,
//! strings are UTF-8 without BOM or length prefix, and raw bytes pass through.
//!
//! Decoding is length-checked: a buffer whose size does not match the
//! requested fixed-width type yields [`CodecError::LengthMismatch`].
//!
//! Booleans are stricter than a plain nonzero test: only the byte `0` reads
//! as `false` and only `1` as `true`. Any other byte is reported as
//! [`CodecError::InvalidBool`] instead of being read as `true`, so a buffer
//! written as some other type is not silently accepted.

use crate::errors::CodecError;

// ----------------------------------------------------------------------------
// Session Value Trait
// ----------------------------------------------------------------------------

/// A value that can be stored as a session variable
pub trait SessionValue: Sized {
    /// Human-readable type name used in decode errors
    const TYPE_NAME: &'static str;

    /// Encode the value into the bytes stored by the platform
    fn encode(&self) -> Result<Vec<u8>, CodecError>;

    /// Decode a value from stored bytes
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

fn fixed<const N: usize>(bytes: &[u8], type_name: &'static str) -> Result<[u8; N], CodecError> {
    bytes.try_into().map_err(|_| CodecError::LengthMismatch {
        type_name,
        expected: N,
        actual: bytes.len(),
    })
}

macro_rules! impl_fixed_width {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl SessionValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn encode(&self) -> Result<Vec<u8>, CodecError> {
                    Ok(self.to_le_bytes().to_vec())
                }

                fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
                    Ok(<$ty>::from_le_bytes(fixed(bytes, Self::TYPE_NAME)?))
                }
            }
        )*
    };
}

impl_fixed_width!(
    i16 => "i16",
    u16 => "u16",
    i32 => "i32",
    u32 => "u32",
    i64 => "i64",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
);

/// Stored as one byte; decoding accepts only `0` and `1`
impl SessionValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(vec![u8::from(*self)])
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        match fixed::<1>(bytes, Self::TYPE_NAME)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl SessionValue for char {
    const TYPE_NAME: &'static str = "char";

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut units = [0u16; 2];
        match self.encode_utf16(&mut units) {
            [unit] => Ok(unit.to_le_bytes().to_vec()),
            _ => Err(CodecError::CharOutOfRange(u32::from(*self))),
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let unit = u16::from_le_bytes(fixed(bytes, Self::TYPE_NAME)?);
        char::from_u32(u32::from(unit)).ok_or(CodecError::InvalidChar(unit))
    }
}

impl SessionValue for String {
    const TYPE_NAME: &'static str = "string";

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
    }
}

impl SessionValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.clone())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bytes.to_vec())
    }
}

// ----------------------------------------------------------------------------
// Session Variable
// ----------------------------------------------------------------------------

/// A named session variable as read from the platform
///
/// The buffer is fixed at read time; the caller chooses the type to decode it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionVariable {
    name: String,
    data: Vec<u8>,
}

impl SessionVariable {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Build a variable from a typed value
    pub fn from_value<T: SessionValue>(
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, CodecError> {
        Ok(Self::new(name, value.encode()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw stored bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the stored bytes as `T`
    pub fn get<T: SessionValue>(&self) -> Result<T, CodecError> {
        T::decode(&self.data)
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        self.get()
    }

    pub fn as_char(&self) -> Result<char, CodecError> {
        self.get()
    }

    pub fn as_i16(&self) -> Result<i16, CodecError> {
        self.get()
    }

    pub fn as_u16(&self) -> Result<u16, CodecError> {
        self.get()
    }

    pub fn as_i32(&self) -> Result<i32, CodecError> {
        self.get()
    }

    pub fn as_u32(&self) -> Result<u32, CodecError> {
        self.get()
    }

    pub fn as_i64(&self) -> Result<i64, CodecError> {
        self.get()
    }

    pub fn as_u64(&self) -> Result<u64, CodecError> {
        self.get()
    }

    pub fn as_f32(&self) -> Result<f32, CodecError> {
        self.get()
    }

    pub fn as_f64(&self) -> Result<f64, CodecError> {
        self.get()
    }

    pub fn as_string(&self) -> Result<String, CodecError> {
        self.get()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
