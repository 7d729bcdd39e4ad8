// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Minimal, concrete `DataType` descriptor.
//!
//! A column's leaf type needs a size, a null fill, comparisons, and binary
//! encode/decode; there is no surrounding catalog crate to pull one from
//! here, so this module ships a small but complete implementation covering
//! the fixed-size and variable-size cases the CAB engine needs to
//! distinguish.

use byteorder::{BigEndian, ByteOrder};

/// Leaf value type at a schema path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataType {
    /// 4-byte signed integer.
    Int32,
    /// 8-byte signed integer.
    Int64,
    /// 8-byte IEEE-754 float.
    Float64,
    /// Arbitrary-length raw bytes.
    Bytes,
    /// Arbitrary-length UTF-8 text (stored as raw bytes; validity is the
    /// caller's responsibility, matching `writeText`'s `const char*` input).
    Text,
}

impl DataType {
    /// Numeric identifier persisted in the info file header.
    #[must_use]
    pub fn type_id(self) -> u16 {
        match self {
            Self::Int32 => 0,
            Self::Int64 => 1,
            Self::Float64 => 2,
            Self::Bytes => 3,
            Self::Text => 4,
        }
    }

    /// Resolves a type back from its persisted identifier.
    pub fn from_type_id(id: u16) -> crate::Result<Self> {
        match id {
            0 => Ok(Self::Int32),
            1 => Ok(Self::Int64),
            2 => Ok(Self::Float64),
            3 => Ok(Self::Bytes),
            4 => Ok(Self::Text),
            _ => Err(crate::Error::Schema("unknown data type id")),
        }
    }

    /// Fixed encoded width, or `None` for variable-size types.
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Int32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
            Self::Bytes | Self::Text => None,
        }
    }

    /// `true` for types with a per-block/per-column min/max summary.
    #[must_use]
    pub fn is_fixed_size(self) -> bool {
        self.fixed_size().is_some()
    }

    /// Fills `buf` with this type's null-sentinel bytes (all zero).
    ///
    /// Only meaningful for fixed-size types; callers must size `buf` to
    /// `fixed_size()`.
    pub fn fill_null(self, buf: &mut [u8]) {
        buf.fill(0);
    }

    /// Copies a value's encoded bytes verbatim.
    #[must_use]
    pub fn copy(self, src: &[u8]) -> Vec<u8> {
        src.to_vec()
    }

    /// `true` if `a < b`.
    #[must_use]
    pub fn compare_less(self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == std::cmp::Ordering::Less
    }

    /// `true` if `a > b`.
    #[must_use]
    pub fn compare_greater(self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == std::cmp::Ordering::Greater
    }

    /// `true` if `a >= b`.
    #[must_use]
    pub fn compare_not_less(self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) != std::cmp::Ordering::Less
    }

    /// `true` if `a <= b`.
    #[must_use]
    pub fn compare_not_greater(self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) != std::cmp::Ordering::Greater
    }

    fn compare(self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        match self {
            Self::Int32 => BigEndian::read_i32(a).cmp(&BigEndian::read_i32(b)),
            Self::Int64 => BigEndian::read_i64(a).cmp(&BigEndian::read_i64(b)),
            Self::Float64 => {
                let (x, y) = (BigEndian::read_f64(a), BigEndian::read_f64(b));
                x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
            }
            Self::Bytes | Self::Text => a.cmp(b),
        }
    }

    /// Encodes a typed scalar to its on-disk byte representation.
    #[must_use]
    pub fn encode_value(self, value: &Value) -> Vec<u8> {
        match (self, value) {
            (Self::Int32, Value::Int32(v)) => {
                let mut buf = [0u8; 4];
                BigEndian::write_i32(&mut buf, *v);
                buf.to_vec()
            }
            (Self::Int64, Value::Int64(v)) => {
                let mut buf = [0u8; 8];
                BigEndian::write_i64(&mut buf, *v);
                buf.to_vec()
            }
            (Self::Float64, Value::Float64(v)) => {
                let mut buf = [0u8; 8];
                BigEndian::write_f64(&mut buf, *v);
                buf.to_vec()
            }
            (Self::Bytes, Value::Bytes(v)) => v.clone(),
            (Self::Text, Value::Text(v)) => v.as_bytes().to_vec(),
            _ => panic!("value does not match data type"),
        }
    }

    /// Decodes a typed scalar from its on-disk byte representation.
    #[must_use]
    pub fn decode_value(self, bytes: &[u8]) -> Value {
        match self {
            Self::Int32 => Value::Int32(BigEndian::read_i32(bytes)),
            Self::Int64 => Value::Int64(BigEndian::read_i64(bytes)),
            Self::Float64 => Value::Float64(BigEndian::read_f64(bytes)),
            Self::Bytes => Value::Bytes(bytes.to_vec()),
            Self::Text => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// A decoded scalar value, used at the write/read call boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// signed 32-bit integer
    Int32(i32),
    /// signed 64-bit integer
    Int64(i64),
    /// 64-bit float
    Float64(f64),
    /// raw bytes
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn int32_compare() {
        let a = DataType::Int32.encode_value(&Value::Int32(5));
        let b = DataType::Int32.encode_value(&Value::Int32(9));
        assert!(DataType::Int32.compare_less(&a, &b));
        assert!(DataType::Int32.compare_greater(&b, &a));
        assert!(DataType::Int32.compare_not_less(&a, &a));
        assert!(DataType::Int32.compare_not_greater(&a, &a));
    }

    #[test]
    fn bytes_compare_lexicographic() {
        let a = DataType::Bytes.encode_value(&Value::Bytes(b"aa".to_vec()));
        let b = DataType::Bytes.encode_value(&Value::Bytes(b"ab".to_vec()));
        assert!(DataType::Bytes.compare_less(&a, &b));
    }

    #[test]
    fn type_id_roundtrip() -> crate::Result<()> {
        for dt in [
            DataType::Int32,
            DataType::Int64,
            DataType::Float64,
            DataType::Bytes,
            DataType::Text,
        ] {
            assert_eq!(dt, DataType::from_type_id(dt.type_id())?);
        }
        Ok(())
    }

    #[test]
    fn value_roundtrip() {
        let v = Value::Int64(-42);
        let bytes = DataType::Int64.encode_value(&v);
        assert_eq!(v, DataType::Int64.decode_value(&bytes));
    }
}
