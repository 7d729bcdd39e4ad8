// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// A 128-bit content checksum, computed with xxh3 over a block's payload bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum(u128);

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Checksum {
    /// Wraps a raw checksum value.
    #[must_use]
    pub fn from_raw(value: u128) -> Self {
        Self(value)
    }

    /// Returns the raw 128-bit integer.
    #[must_use]
    pub fn into_u128(self) -> u128 {
        self.0
    }

    /// Computes the checksum of a byte slice.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(bytes))
    }

    /// Checks `self` (the value read from a block header) against `computed`
    /// (the checksum of the bytes actually read from disk).
    pub(crate) fn check(&self, computed: Self) -> crate::Result<()> {
        if self.0 == computed.0 {
            Ok(())
        } else {
            Err(crate::Error::InvalidChecksum {
                expected: *self,
                got: computed,
            })
        }
    }
}

impl Encode for Checksum {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<BigEndian>((self.0 >> 64) as u64)?;
        writer.write_u64::<BigEndian>(self.0 as u64)?;
        Ok(())
    }
}

impl Decode for Checksum {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let hi = u128::from(reader.read_u64::<BigEndian>()?);
        let lo = u128::from(reader.read_u64::<BigEndian>()?);
        Ok(Self((hi << 64) | lo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn checksum_stable() {
        let a = Checksum::of(b"hello world");
        let b = Checksum::of(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs() {
        let a = Checksum::of(b"hello world");
        let b = Checksum::of(b"hello worlt");
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_check() {
        let a = Checksum::of(b"abc");
        let b = Checksum::of(b"abc");
        assert!(a.check(b).is_ok());

        let c = Checksum::of(b"abd");
        assert!(a.check(c).is_err());
    }

    #[test]
    fn checksum_encode_roundtrip() -> crate::Result<()> {
        let a = Checksum::of(b"some block payload");
        let bytes = a.encode_into_vec();
        let b = Checksum::decode_from(&mut &bytes[..])?;
        assert_eq!(a, b);
        Ok(())
    }
}
