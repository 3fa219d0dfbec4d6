use std::fmt;

use super::MAX_STR_LEN;
use super::error::{StorageError, StorageResult};

/// Type tag for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// Serialized width of a field of this type in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => MAX_STR_LEN + 4,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Str => write!(f, "STRING"),
        }
    }
}

/// A single typed column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    /// Serialize this field to its fixed-width on-disk form.
    ///
    /// Integers are 4 bytes big-endian. Strings are a 4-byte big-endian
    /// length followed by the bytes, zero-padded out to `MAX_STR_LEN`.
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        match self {
            Field::Int(v) => Ok(v.to_be_bytes().to_vec()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > MAX_STR_LEN {
                    return Err(StorageError::Serialization(format!(
                        "string length {} exceeds maximum {}",
                        bytes.len(),
                        MAX_STR_LEN
                    )));
                }
                let mut result = Vec::with_capacity(MAX_STR_LEN + 4);
                result.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                result.extend_from_slice(bytes);
                result.resize(MAX_STR_LEN + 4, 0);
                Ok(result)
            }
        }
    }

    /// Deserialize a field of the given type from its fixed-width form
    pub fn deserialize(field_type: FieldType, data: &[u8]) -> StorageResult<Self> {
        if data.len() != field_type.byte_size() {
            return Err(StorageError::Deserialization(format!(
                "expected {} bytes for {}, got {}",
                field_type.byte_size(),
                field_type,
                data.len()
            )));
        }

        match field_type {
            FieldType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(data);
                Ok(Field::Int(i32::from_be_bytes(buf)))
            }
            FieldType::Str => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&data[..4]);
                let len = u32::from_be_bytes(buf) as usize;
                if len > MAX_STR_LEN {
                    return Err(StorageError::Deserialization(format!(
                        "string length {} exceeds maximum {}",
                        len, MAX_STR_LEN
                    )));
                }
                let s = String::from_utf8(data[4..4 + len].to_vec())
                    .map_err(|e| StorageError::Deserialization(format!("invalid UTF-8: {}", e)))?;
                Ok(Field::Str(s))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}
