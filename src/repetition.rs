// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Repetition codec.
//!
//! Encodes a logical repetition level (`0..=max_rep`) into the compact
//! in-block representation used by storage, and decodes it back. All `rep`
//! values a writer accepts are routed through [`RepetitionCodec::encode`]
//! before being stored; storage itself never sees the logical level
//! directly.

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Which repetition-encoding strategy a column uses, chosen from the
/// path's maximum repetition level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RepetitionKind {
    /// `max_rep == 0`: no repetition is ever stored.
    None,
    /// `max_rep == 1`: a single bit per item suffices.
    Single,
    /// `max_rep > 1`: a small integer per item.
    Multi,
}

impl RepetitionKind {
    /// Picks the cheapest representation for a path's maximum repetition level.
    #[must_use]
    pub fn for_max_rep(max_rep: u32) -> Self {
        match max_rep {
            0 => Self::None,
            1 => Self::Single,
            _ => Self::Multi,
        }
    }
}

impl Encode for RepetitionKind {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(match self {
            Self::None => 0,
            Self::Single => 1,
            Self::Multi => 2,
        })?;
        Ok(())
    }
}

impl Decode for RepetitionKind {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            0 => Ok(Self::None),
            1 => Ok(Self::Single),
            2 => Ok(Self::Multi),
            tag => Err(DecodeError::InvalidTag(("RepetitionKind", tag))),
        }
    }
}

/// Encodes/decodes repetition levels for a single column session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RepetitionCodec {
    kind: RepetitionKind,
}

impl RepetitionCodec {
    /// Builds a codec for a path with the given maximum repetition level.
    #[must_use]
    pub fn new(max_rep: u32) -> Self {
        Self {
            kind: RepetitionKind::for_max_rep(max_rep),
        }
    }

    /// Builds a codec of an explicit kind (used when reopening a column).
    #[must_use]
    pub fn of_kind(kind: RepetitionKind) -> Self {
        Self { kind }
    }

    /// The codec's kind.
    #[must_use]
    pub fn kind(&self) -> RepetitionKind {
        self.kind
    }

    /// Encodes a logical repetition level into its storage representation.
    #[must_use]
    pub fn encode(&self, level: u32) -> u32 {
        match self.kind {
            RepetitionKind::None => 0,
            RepetitionKind::Single => u32::from(level != 0),
            RepetitionKind::Multi => level,
        }
    }

    /// Decodes a storage representation back into a logical repetition level.
    #[must_use]
    pub fn decode(&self, stored: u32) -> u32 {
        match self.kind {
            RepetitionKind::None => 0,
            RepetitionKind::Single => stored,
            RepetitionKind::Multi => stored,
        }
    }
}
