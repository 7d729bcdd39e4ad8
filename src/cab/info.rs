// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Block descriptors and the info file that holds them: the per-block
//! footer and the append-only buffer that persists them.

use crate::{
    cab::block::BlockType,
    checksum::Checksum,
    coding::{Decode, DecodeError, Encode, EncodeError},
    compression::CompressionType,
    data_type::DataType,
    file::{self, MAGIC_BYTES},
    repetition::RepetitionKind,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Min/max summary over a type's fixed-size encoded values.
///
/// Left at `has_min = has_max = false` for variable-size types, where
/// predicate pushdown degrades to always-candidate.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnValueInfo {
    has_min: bool,
    has_max: bool,
    min: Vec<u8>,
    max: Vec<u8>,
}

impl ColumnValueInfo {
    /// A fresh value info with no observations yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if a minimum has been observed.
    #[must_use]
    pub fn has_min(&self) -> bool {
        self.has_min
    }

    /// `true` if a maximum has been observed.
    #[must_use]
    pub fn has_max(&self) -> bool {
        self.has_max
    }

    /// The observed minimum's encoded bytes, if any.
    #[must_use]
    pub fn min(&self) -> Option<&[u8]> {
        self.has_min.then_some(self.min.as_slice())
    }

    /// The observed maximum's encoded bytes, if any.
    #[must_use]
    pub fn max(&self) -> Option<&[u8]> {
        self.has_max.then_some(self.max.as_slice())
    }

    /// Folds one more encoded value into the summary.
    ///
    /// Only meaningful for fixed-size types; callers must not call this for
    /// variable-size columns (the writer checks `data_type.is_fixed_size()`
    /// before ever observing a value).
    pub fn observe(&mut self, data_type: DataType, value: &[u8]) {
        if !self.has_min || data_type.compare_less(value, &self.min) {
            self.min = value.to_vec();
            self.has_min = true;
        }
        if !self.has_max || data_type.compare_greater(value, &self.max) {
            self.max = value.to_vec();
            self.has_max = true;
        }
    }

    /// Folds another summary into this one.
    pub fn merge(&mut self, other: &Self, data_type: DataType) {
        if let Some(min) = other.min() {
            self.observe(data_type, min);
        }
        if let Some(max) = other.max() {
            self.observe(data_type, max);
        }
    }
}

impl Encode for ColumnValueInfo {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(u8::from(self.has_min))?;
        if self.has_min {
            writer.write_u32::<BigEndian>(self.min.len() as u32)?;
            writer.write_all(&self.min)?;
        }

        writer.write_u8(u8::from(self.has_max))?;
        if self.has_max {
            writer.write_u32::<BigEndian>(self.max.len() as u32)?;
            writer.write_all(&self.max)?;
        }

        Ok(())
    }
}

impl Decode for ColumnValueInfo {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let has_min = reader.read_u8()? != 0;
        let min = if has_min {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            buf
        } else {
            Vec::new()
        };

        let has_max = reader.read_u8()? != 0;
        let max = if has_max {
            let len = reader.read_u32::<BigEndian>()? as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            buf
        } else {
            Vec::new()
        };

        Ok(Self {
            has_min,
            has_max,
            min,
            max,
        })
    }
}

/// One block's descriptor: everything needed to locate and interpret its
/// content bytes, and to fold its summary into the column footer.
#[derive(Clone, Debug)]
pub struct CabInfo {
    /// First record id covered by this block.
    pub bgn_recd: u64,
    /// Number of complete records in this block.
    pub record_num: u64,
    /// Number of items (including nulls) in this block.
    pub item_num: u64,
    /// Number of null items in this block.
    pub null_num: u64,
    /// Byte offset of this block's content in the content file.
    pub file_off: u64,
    /// On-disk (post-compression) size of the block's content payload.
    pub strg_size: u64,
    /// Size of the optional Bloom filter blob immediately following the
    /// content payload, `0` if the block has none.
    pub bloom_size: u64,
    /// Checksum of the block's on-disk content payload.
    pub checksum: Checksum,
    /// How this block's content collapsed.
    pub block_type: BlockType,
    /// This block's own min/max summary.
    pub value_info: ColumnValueInfo,
}

impl CabInfo {
    /// Offset immediately past this block's content payload, where a Bloom
    /// filter blob would begin.
    #[must_use]
    pub fn bloom_off(&self) -> u64 {
        self.file_off + self.strg_size
    }
}

impl Encode for CabInfo {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<BigEndian>(self.bgn_recd)?;
        writer.write_u64::<BigEndian>(self.record_num)?;
        writer.write_u64::<BigEndian>(self.item_num)?;
        writer.write_u64::<BigEndian>(self.null_num)?;
        writer.write_u64::<BigEndian>(self.file_off)?;
        writer.write_u64::<BigEndian>(self.strg_size)?;
        writer.write_u64::<BigEndian>(self.bloom_size)?;
        self.checksum.encode_into(writer)?;
        writer.write_u8(self.block_type.tag())?;
        self.value_info.encode_into(writer)?;
        Ok(())
    }
}

impl Decode for CabInfo {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let bgn_recd = reader.read_u64::<BigEndian>()?;
        let record_num = reader.read_u64::<BigEndian>()?;
        let item_num = reader.read_u64::<BigEndian>()?;
        let null_num = reader.read_u64::<BigEndian>()?;
        let file_off = reader.read_u64::<BigEndian>()?;
        let strg_size = reader.read_u64::<BigEndian>()?;
        let bloom_size = reader.read_u64::<BigEndian>()?;
        let checksum = Checksum::decode_from(reader)?;
        let block_type = BlockType::from_tag(reader.read_u8()?)
            .map_err(|_| DecodeError::InvalidHeader("block type"))?;
        let value_info = ColumnValueInfo::decode_from(reader)?;

        Ok(Self {
            bgn_recd,
            record_num,
            item_num,
            null_num,
            file_off,
            strg_size,
            bloom_size,
            checksum,
            block_type,
            value_info,
        })
    }
}

/// Fixed, column-wide facts stored at the front of the info file.
#[derive(Clone, Debug)]
struct InfoHeader {
    data_type: DataType,
    max_rep: u32,
    max_def: u32,
    capacity: u64,
    rep_kind: RepetitionKind,
    compression: CompressionType,
    column_value_info: ColumnValueInfo,
    descriptor_count: u64,
}

impl Encode for InfoHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u16::<BigEndian>(self.data_type.type_id())?;
        writer.write_u32::<BigEndian>(self.max_rep)?;
        writer.write_u32::<BigEndian>(self.max_def)?;
        writer.write_u64::<BigEndian>(self.capacity)?;
        self.rep_kind.encode_into(writer)?;
        self.compression.encode_into(writer)?;
        self.column_value_info.encode_into(writer)?;
        writer.write_u64::<BigEndian>(self.descriptor_count)?;
        Ok(())
    }
}

impl Decode for InfoHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_BYTES {
            return Err(DecodeError::InvalidHeader("bad info file magic"));
        }

        let type_id = reader.read_u16::<BigEndian>()?;
        let data_type =
            DataType::from_type_id(type_id).map_err(|_| DecodeError::InvalidHeader("data type"))?;
        let max_rep = reader.read_u32::<BigEndian>()?;
        let max_def = reader.read_u32::<BigEndian>()?;
        let capacity = reader.read_u64::<BigEndian>()?;
        let rep_kind = RepetitionKind::decode_from(reader)?;
        let compression = CompressionType::decode_from(reader)?;
        let column_value_info = ColumnValueInfo::decode_from(reader)?;
        let descriptor_count = reader.read_u64::<BigEndian>()?;

        Ok(Self {
            data_type,
            max_rep,
            max_def,
            capacity,
            rep_kind,
            compression,
            column_value_info,
            descriptor_count,
        })
    }
}

/// Owns the `<base>.cab.info` file: the column-wide header/footer plus the
/// append-only array of block descriptors.
pub struct CabInfoBuffer {
    path: PathBuf,
    file: File,
    header: InfoHeader,
    descriptors: Vec<CabInfo>,
}

impl CabInfoBuffer {
    /// Creates a brand new info file for a column session.
    pub fn create(
        path: &Path,
        data_type: DataType,
        max_rep: u32,
        max_def: u32,
        capacity: u64,
        rep_kind: RepetitionKind,
        compression: CompressionType,
    ) -> crate::Result<Self> {
        let header = InfoHeader {
            data_type,
            max_rep,
            max_def,
            capacity,
            rep_kind,
            compression,
            column_value_info: ColumnValueInfo::new(),
            descriptor_count: 0,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .open(path)?;
        file.write_all(&header.encode_into_vec())?;
        file.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            descriptors: Vec::new(),
        })
    }

    /// Reopens an existing info file, decoding its header and descriptor
    /// array into memory.
    pub fn open(path: &Path) -> crate::Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        let mut cursor = Cursor::new(&bytes[..]);
        let header = InfoHeader::decode_from(&mut cursor)?;

        let mut descriptors = Vec::with_capacity(header.descriptor_count as usize);
        for _ in 0..header.descriptor_count {
            descriptors.push(CabInfo::decode_from(&mut cursor)?);
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            descriptors,
        })
    }

    /// The column's data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    /// Maximum repetition level.
    #[must_use]
    pub fn max_rep(&self) -> u32 {
        self.header.max_rep
    }

    /// Maximum definition level.
    #[must_use]
    pub fn max_def(&self) -> u32 {
        self.header.max_def
    }

    /// Block capacity `C`.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.header.capacity
    }

    /// The repetition encoding kind in use.
    #[must_use]
    pub fn rep_kind(&self) -> RepetitionKind {
        self.header.rep_kind
    }

    /// The compression type in use.
    #[must_use]
    pub fn compression(&self) -> CompressionType {
        self.header.compression
    }

    /// The column-wide value summary, folded from every flushed block.
    #[must_use]
    pub fn column_value_info(&self) -> &ColumnValueInfo {
        &self.header.column_value_info
    }

    /// All descriptors, in block order.
    #[must_use]
    pub fn descriptors(&self) -> &[CabInfo] {
        &self.descriptors
    }

    /// Number of blocks described so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// `true` if no block has ever been flushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor of the last flushed block, if any.
    #[must_use]
    pub fn last(&self) -> Option<&CabInfo> {
        self.descriptors.last()
    }

    /// Appends one flushed block's descriptor: folds its value info into
    /// the column footer, appends the encoded descriptor to the file, and
    /// atomically rewrites the header+footer prefix.
    pub fn append_block(&mut self, info: CabInfo) -> crate::Result<()> {
        let old_header_len = self.header.encode_into_vec().len() as u64;

        self.header
            .column_value_info
            .merge(&info.value_info, self.header.data_type);
        self.header.descriptor_count += 1;

        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&info.encode_into_vec())?;
        self.file.flush()?;
        self.file.sync_all()?;

        file::rewrite_prefix_atomic(&self.path, old_header_len, &self.header.encode_into_vec())?;

        // The rewrite replaced the underlying file; reopen our handle onto it.
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        self.descriptors.push(info);

        Ok(())
    }

    /// If the last block is a partial (non-full) tail, removes it from the
    /// descriptor array and column footer and returns it so the caller can
    /// reconstruct and re-flush it merged with new items. Returns `None` if
    /// the column is empty or its last block was already full.
    pub fn reopen_tail(&mut self) -> crate::Result<Option<CabInfo>> {
        let Some(last) = self.descriptors.last() else {
            return Ok(None);
        };
        if last.record_num >= self.header.capacity {
            return Ok(None);
        }

        let popped = self.descriptors.pop().expect("checked non-empty above");

        let mut column_value_info = ColumnValueInfo::new();
        for d in &self.descriptors {
            column_value_info.merge(&d.value_info, self.header.data_type);
        }
        self.header.column_value_info = column_value_info;
        self.header.descriptor_count = self.descriptors.len() as u64;

        let current_len = self.file.metadata()?.len();
        let mut new_content = self.header.encode_into_vec();
        for d in &self.descriptors {
            new_content.extend(d.encode_into_vec());
        }

        file::rewrite_prefix_atomic(&self.path, current_len, &new_content)?;
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        Ok(Some(popped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn value_info_tracks_min_max() {
        let mut info = ColumnValueInfo::new();
        assert!(!info.has_min());

        info.observe(DataType::Int32, &DataType::Int32.encode_value(&crate::data_type::Value::Int32(5)));
        info.observe(DataType::Int32, &DataType::Int32.encode_value(&crate::data_type::Value::Int32(1)));
        info.observe(DataType::Int32, &DataType::Int32.encode_value(&crate::data_type::Value::Int32(9)));

        assert_eq!(crate::data_type::Value::Int32(1), DataType::Int32.decode_value(info.min().expect("has min")));
        assert_eq!(crate::data_type::Value::Int32(9), DataType::Int32.decode_value(info.max().expect("has max")));
    }

    #[test]
    fn value_info_encode_roundtrip() -> crate::Result<()> {
        let mut info = ColumnValueInfo::new();
        info.observe(DataType::Int64, &DataType::Int64.encode_value(&crate::data_type::Value::Int64(42)));

        let bytes = info.encode_into_vec();
        let decoded = ColumnValueInfo::decode_from(&mut &bytes[..])?;
        assert_eq!(info, decoded);

        Ok(())
    }

    #[test]
    fn info_buffer_create_and_append() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("col.cab.info");

        let mut buf = CabInfoBuffer::create(
            &path,
            DataType::Int32,
            0,
            1,
            4,
            RepetitionKind::None,
            CompressionType::None,
        )?;
        assert!(buf.is_empty());

        let mut value_info = ColumnValueInfo::new();
        value_info.observe(DataType::Int32, &DataType::Int32.encode_value(&crate::data_type::Value::Int32(3)));

        buf.append_block(CabInfo {
            bgn_recd: 0,
            record_num: 4,
            item_num: 4,
            null_num: 0,
            file_off: 0,
            strg_size: 16,
            bloom_size: 0,
            checksum: Checksum::of(b"whatever"),
            block_type: BlockType::Normal,
            value_info,
        })?;

        assert_eq!(1, buf.len());
        assert!(buf.column_value_info().has_min());

        drop(buf);

        let reopened = CabInfoBuffer::open(&path)?;
        assert_eq!(1, reopened.len());
        assert_eq!(4, reopened.descriptors()[0].record_num);
        assert!(reopened.column_value_info().has_min());

        Ok(())
    }
}
