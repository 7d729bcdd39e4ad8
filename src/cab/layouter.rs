// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Serializes a [`CabBlock`]'s in-memory state to/from the content file's
//! per-block payload bytes, handling compression and the trivial/allnull/
//! normal content-omission rules.
//!
//! Definition levels are persisted as a single byte per item rather than
//! bit-packed to `ceil(log2(max_def+1))` bits, and nullness is derived from
//! `def < max_def` rather than a separate null bitmap region — both are
//! documented, deliberate simplifications (see `SPEC_FULL.md` §9). Nesting
//! depth in any real schema stays well under 256, so the single-byte
//! encoding is not a practical limitation; [`CabBlock::write_item`] callers
//! are expected to keep `max_def` within that range.
//!
//! `Trivial` blocks contribute zero bytes of content: reps, defs, and the
//! one shared value are all reconstructed from the descriptor alone.

use crate::{
    cab::block::{BlockType, CabBlock},
    compression::CompressionType,
    data_type::DataType,
    repetition::RepetitionKind,
    value_array::{BitVector, ValueArray},
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Stateless (de)serializer for one block's content payload.
pub struct CabLayouter;

impl CabLayouter {
    /// Encodes `block`'s content into compressed bytes ready to be written
    /// at a descriptor's `file_off`. Returns the bytes; the caller is
    /// responsible for computing `strg_size`/checksum from the result.
    /// A `Trivial` block (see [`BlockType`]) contributes zero content
    /// bytes: its repetition is uniformly 0, its definition uniformly
    /// `max_def`, and its one shared value lives in the descriptor's
    /// value summary rather than the content file, so there is nothing
    /// left to persist here at all.
    pub fn serialize(
        block: &CabBlock,
        rep_kind: RepetitionKind,
        compression: CompressionType,
    ) -> crate::Result<Vec<u8>> {
        let block_type = block.classify();
        if block_type == BlockType::Trivial {
            return compression.compress(&[]);
        }

        let mut raw = Vec::new();
        Self::write_reps(&mut raw, block.reps(), rep_kind)?;
        Self::write_defs(&mut raw, block.defs())?;
        Self::write_values(&mut raw, block, block_type)?;

        compression.compress(&raw)
    }

    /// Decodes a block's content payload back into a [`CabBlock`].
    ///
    /// `trivial_value` supplies the single shared value for a `Trivial`
    /// block (read from the descriptor's value summary by the caller);
    /// it is ignored for every other block type. `bytes` is not read at
    /// all for `Trivial` blocks — callers should skip the content-file
    /// read entirely rather than pass real bytes in for it.
    #[allow(clippy::too_many_arguments)]
    pub fn deserialize(
        bytes: &[u8],
        compression: CompressionType,
        rep_kind: RepetitionKind,
        block_type: BlockType,
        item_count: u64,
        capacity: u64,
        bgn_recd: u64,
        max_def: u32,
        data_type: DataType,
        trivial_value: Option<&[u8]>,
    ) -> crate::Result<CabBlock> {
        if block_type == BlockType::Trivial {
            let reps = vec![0u32; item_count as usize];
            let defs = vec![max_def; item_count as usize];
            let mut values = ValueArray::new();
            if item_count > 0 {
                let value = trivial_value
                    .ok_or(crate::Error::Corruption(
                        "trivial block missing its value summary",
                    ))?
                    .to_vec();
                for _ in 0..item_count {
                    values.push(value.clone());
                }
            }
            return Ok(CabBlock::init2read(
                capacity, bgn_recd, max_def, data_type, reps, defs, values,
            ));
        }

        let raw = compression.decompress(bytes)?;
        let mut cursor = Cursor::new(&raw[..]);

        let reps = Self::read_reps(&mut cursor, rep_kind, item_count)?;
        let defs = Self::read_defs(&mut cursor, item_count)?;
        let values = Self::read_values(&mut cursor, data_type, block_type, &defs, max_def)?;

        Ok(CabBlock::init2read(
            capacity, bgn_recd, max_def, data_type, reps, defs, values,
        ))
    }

    fn write_reps(out: &mut Vec<u8>, reps: &[u32], kind: RepetitionKind) -> crate::Result<()> {
        match kind {
            RepetitionKind::None => {}
            RepetitionKind::Single => {
                let mut bits = BitVector::new();
                for &r in reps {
                    bits.push(r != 0);
                }
                let packed = bits.to_packed_bytes();
                out.write_all(&packed)?;
            }
            RepetitionKind::Multi => {
                for &r in reps {
                    out.write_u32::<BigEndian>(r)?;
                }
            }
        }
        Ok(())
    }

    fn read_reps<R: Read>(
        reader: &mut R,
        kind: RepetitionKind,
        item_count: u64,
    ) -> crate::Result<Vec<u32>> {
        match kind {
            RepetitionKind::None => Ok(vec![0; item_count as usize]),
            RepetitionKind::Single => {
                let byte_len = (item_count as usize).div_ceil(8);
                let mut packed = vec![0u8; byte_len];
                reader.read_exact(&mut packed)?;
                let bits = BitVector::from_packed_bytes(&packed, item_count as usize);
                Ok((0..item_count as usize)
                    .map(|i| u32::from(bits.get(i)))
                    .collect())
            }
            RepetitionKind::Multi => {
                let mut reps = Vec::with_capacity(item_count as usize);
                for _ in 0..item_count {
                    reps.push(reader.read_u32::<BigEndian>()?);
                }
                Ok(reps)
            }
        }
    }

    fn write_defs(out: &mut Vec<u8>, defs: &[u32]) -> crate::Result<()> {
        for &d in defs {
            out.write_u8(u8::try_from(d).map_err(|_| {
                crate::Error::Corruption("definition level exceeds single-byte range")
            })?)?;
        }
        Ok(())
    }

    fn read_defs<R: Read>(reader: &mut R, item_count: u64) -> crate::Result<Vec<u32>> {
        let mut defs = Vec::with_capacity(item_count as usize);
        for _ in 0..item_count {
            defs.push(u32::from(reader.read_u8()?));
        }
        Ok(defs)
    }

    /// Called only for `Normal`/`AllNull` blocks; `Trivial` blocks never
    /// reach here, `serialize` short-circuits before assembling any
    /// content bytes for them.
    fn write_values(out: &mut Vec<u8>, block: &CabBlock, block_type: BlockType) -> crate::Result<()> {
        match block_type {
            BlockType::AllNull | BlockType::Trivial => Ok(()),
            BlockType::Normal => {
                for value in block.values().as_slice() {
                    Self::write_one_value(out, block.data_type(), value)?;
                }
                Ok(())
            }
        }
    }

    fn write_one_value(out: &mut Vec<u8>, data_type: DataType, value: &[u8]) -> crate::Result<()> {
        if data_type.is_fixed_size() {
            out.write_all(value)?;
        } else {
            out.write_u32::<BigEndian>(value.len() as u32)?;
            out.write_all(value)?;
        }
        Ok(())
    }

    fn read_one_value<R: Read>(reader: &mut R, data_type: DataType) -> crate::Result<Vec<u8>> {
        if let Some(size) = data_type.fixed_size() {
            let mut buf = vec![0u8; size];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        } else {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        }
    }

    /// Called only for `Normal`/`AllNull` blocks; `Trivial` blocks never
    /// reach here, `deserialize` short-circuits before touching any
    /// content bytes for them.
    fn read_values<R: Read>(
        reader: &mut R,
        data_type: DataType,
        block_type: BlockType,
        defs: &[u32],
        max_def: u32,
    ) -> crate::Result<ValueArray> {
        let mut values = ValueArray::new();

        match block_type {
            BlockType::AllNull | BlockType::Trivial => {}
            BlockType::Normal => {
                for &d in defs {
                    if d >= max_def {
                        values.push(Self::read_one_value(reader, data_type)?);
                    }
                }
            }
        }

        Ok(values)
    }
}
