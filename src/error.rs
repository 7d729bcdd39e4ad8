// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    checksum::Checksum,
};

/// Errors that can occur while operating a CAB column session.
#[derive(Debug)]
pub enum Error {
    /// I/O error (seek/read/write failure, short read)
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// A descriptor, block header or footer is internally inconsistent
    Corruption(&'static str),

    /// Schema path resolution failed, or a capacity mismatch was found on append
    Schema(&'static str),

    /// Operation attempted in the wrong session state (e.g. after a fatal error)
    State(&'static str),

    /// Item index or record index out of range
    Bounds(&'static str),

    /// Decompression failed
    Decompress(&'static str),

    /// Checksum stored in a block header did not match the computed one
    InvalidChecksum {
        /// expected checksum, as read from the header
        expected: Checksum,
        /// checksum computed from the block bytes
        got: Checksum,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CabStoreError: {self:?}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// CAB engine result
pub type Result<T> = std::result::Result<T, Error>;
