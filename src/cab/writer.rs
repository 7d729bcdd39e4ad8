// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Writes a new column session from scratch.

use crate::{
    cab::{
        block::CabBlock,
        info::CabInfo,
        layouter::CabLayouter,
        operator::Operator,
    },
    checksum::Checksum,
    config::Config,
    data_type::{DataType, Value},
    schema::{SchemaPath, SchemaTree},
};
use std::io::{Seek, SeekFrom, Write};

/// Writes records into a brand new column session, one item at a time.
///
/// Only usable against a column with no prior descriptors; reopening a
/// column a writer already populated is [`crate::cab::appender::CabAppender`]'s
/// job.
pub struct CabWriter {
    op: Operator,
    current: CabBlock,
}

impl CabWriter {
    /// Starts a fresh column session, beginning at record `rbgn`.
    ///
    /// `rbgn` need not land on a block boundary: the first block begins at
    /// `floor(rbgn / capacity) * capacity` and every record strictly before
    /// `rbgn` is null-padded.
    pub fn init2write(
        base_path: &std::path::Path,
        path: &SchemaPath,
        schema: &SchemaTree,
        config: Config,
        rbgn: u64,
    ) -> crate::Result<Self> {
        let op = Operator::init(base_path, path, schema, config)?;

        if !op.info().is_empty() {
            return Err(crate::Error::State(
                "column already has flushed blocks; use CabAppender instead",
            ));
        }

        let capacity = op.info().capacity();
        let max_def = op.info().max_def();
        let data_type = op.info().data_type();

        let aligned_begin = if capacity == 0 { 0 } else { (rbgn / capacity) * capacity };
        let mut current = CabBlock::init2write(capacity, aligned_begin, max_def, data_type);

        for _ in aligned_begin..rbgn {
            current.write_item(0, 0, None);
        }

        Ok(Self { op, current })
    }

    /// Writes one null item.
    pub fn write_null(&mut self, rep: u32, def: u32) -> crate::Result<()> {
        self.write_item(rep, def, None)
    }

    /// Writes `n` null items in a row.
    pub fn write_nulls(&mut self, rep: u32, def: u32, n: u64) -> crate::Result<()> {
        for _ in 0..n {
            self.write_null(rep, def)?;
        }
        Ok(())
    }

    /// Writes one non-null text item.
    pub fn write_text(&mut self, rep: u32, text: &str) -> crate::Result<()> {
        let max_def = self.op.info().max_def();
        let bytes = DataType::Text.encode_value(&Value::Text(text.to_owned()));
        self.write_item(rep, max_def, Some(bytes))
    }

    /// Writes one non-null value item.
    pub fn write_value(&mut self, rep: u32, value: &Value) -> crate::Result<()> {
        let max_def = self.op.info().max_def();
        let data_type = self.op.info().data_type();
        let bytes = data_type.encode_value(value);
        self.write_item(rep, max_def, Some(bytes))
    }

    /// Writes one non-null raw-bytes item.
    pub fn write_bin_val(&mut self, rep: u32, bytes: Vec<u8>) -> crate::Result<()> {
        let max_def = self.op.info().max_def();
        self.write_item(rep, max_def, Some(bytes))
    }

    fn write_item(&mut self, rep: u32, def: u32, value: Option<Vec<u8>>) -> crate::Result<()> {
        let encoded_rep = self.op.codec().encode(rep);

        if self.current.write_item(encoded_rep, def, value.clone()) == 1 {
            return Ok(());
        }

        self.flush_current_block()?;
        self.prepare_next_block();

        if self.current.write_item(encoded_rep, def, value) == 0 {
            return Err(crate::Error::Corruption(
                "freshly prepared block rejected its first item",
            ));
        }

        Ok(())
    }

    fn prepare_next_block(&mut self) {
        let capacity = self.current.capacity();
        let next_bgn = self.current.bgn_recd() + capacity;
        let max_def = self.current.max_def();
        let data_type = self.current.data_type();
        self.current = CabBlock::init2write(capacity, next_bgn, max_def, data_type);
    }

    /// Flushes the current block's content and descriptor, leaving the
    /// session without a current block in flight until the caller writes
    /// again (writes after a manual flush implicitly prepare a new block).
    fn flush_current_block(&mut self) -> crate::Result<()> {
        if self.current.item_count() == 0 {
            return Ok(());
        }

        let rep_kind = self.op.codec().kind();
        let compression = self.op.config().compression;
        let bytes = CabLayouter::serialize(&self.current, rep_kind, compression)?;
        let checksum = Checksum::of(&bytes);

        let file_off = self.op.content_len()?;
        self.op.content_file_mut().seek(SeekFrom::Start(file_off))?;
        self.op.content_file_mut().write_all(&bytes)?;
        self.op.content_file_mut().flush()?;
        self.op.content_file_mut().sync_all()?;

        #[cfg(feature = "bloom")]
        let bloom_size = self.flush_bloom_filter(file_off + bytes.len() as u64)?;
        #[cfg(not(feature = "bloom"))]
        let bloom_size = 0;

        let info = CabInfo {
            bgn_recd: self.current.bgn_recd(),
            record_num: self.current.record_count(),
            item_num: self.current.item_count(),
            null_num: self.current.null_count(),
            file_off,
            strg_size: bytes.len() as u64,
            bloom_size,
            checksum,
            block_type: self.current.classify(),
            value_info: self.current.value_info(),
        };

        log::debug!(
            "flushed block bgn_recd={} record_num={} item_num={} strg_size={}",
            info.bgn_recd,
            info.record_num,
            info.item_num,
            info.strg_size
        );

        self.op.info_mut().append_block(info)
    }

    /// Flushes whatever the current (possibly partial) block holds.
    ///
    /// Called by `Drop`; exposed so callers can force a flush without
    /// dropping the writer.
    pub fn flush(&mut self) -> crate::Result<()> {
        self.flush_current_block()
    }

    /// Number of blocks flushed so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.op.info().len()
    }
}

#[cfg(feature = "bloom")]
impl CabWriter {
    /// Builds and appends a Bloom filter over the current block's non-null
    /// values, immediately after its content bytes at `bloom_off`, if the
    /// session's construction policy is active. Returns the number of bytes
    /// written (`0` if the policy is inactive or the block has no values).
    fn flush_bloom_filter(&mut self, bloom_off: u64) -> crate::Result<u64> {
        use crate::{bloom::BloomFilter, coding::Encode, config::BloomConstructionPolicy};

        if self.current.values().is_empty() {
            return Ok(0);
        }
        let n = self.current.values().len();

        let mut filter = match self.op.config().bloom_policy {
            BloomConstructionPolicy::BitsPerKey(0) => return Ok(0),
            BloomConstructionPolicy::BitsPerKey(bpk) => BloomFilter::with_bpk(n, bpk),
            BloomConstructionPolicy::FpRate(fpr) => BloomFilter::with_fp_rate(n, fpr),
        };

        for value in self.current.values().as_slice() {
            filter.set_with_hash(BloomFilter::get_hash(value));
        }

        let bytes = filter.encode_into_vec();
        self.op.content_file_mut().seek(SeekFrom::Start(bloom_off))?;
        self.op.content_file_mut().write_all(&bytes)?;
        self.op.content_file_mut().flush()?;
        Ok(bytes.len() as u64)
    }
}

impl Drop for CabWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush_current_block() {
            log::error!("failed to flush tail block on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PathInfo;
    use test_log::test;

    fn schema_with(path: &str, info: PathInfo) -> SchemaTree {
        let mut tree = SchemaTree::new();
        tree.register(SchemaPath::from(path), info);
        tree
    }

    #[test]
    fn writes_fixed_size_ints_across_multiple_blocks() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "n",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );
        let config = Config::with_capacity(4);

        {
            let mut writer =
                CabWriter::init2write(&base, &SchemaPath::from("n"), &schema, config.clone(), 0)?;
            for v in 0..10 {
                writer.write_value(0, &Value::Int32(v))?;
            }
        }

        let info = crate::cab::info::CabInfoBuffer::open(&crate::file::info_path(&crate::file::content_path(&base)))?;
        // 10 records at capacity 4 -> 3 blocks (4, 4, 2).
        assert_eq!(3, info.len());
        assert_eq!(4, info.descriptors()[0].record_num);
        assert_eq!(2, info.descriptors()[2].record_num);
        assert!(info.column_value_info().has_min());

        Ok(())
    }

    #[test]
    fn unaligned_rbgn_pads_with_nulls() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "n",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );
        let config = Config::with_capacity(4);

        {
            let mut writer =
                CabWriter::init2write(&base, &SchemaPath::from("n"), &schema, config, 6)?;
            writer.write_value(0, &Value::Int32(42))?;
            writer.flush()?;
        }

        let info = crate::cab::info::CabInfoBuffer::open(&crate::file::info_path(&crate::file::content_path(&base)))?;
        assert_eq!(1, info.len());
        // capacity 4, rbgn 6 -> block begins at the floor-aligned boundary 4,
        // with records 4 and 5 null-padded before record 6's real value.
        assert_eq!(4, info.descriptors()[0].bgn_recd);
        assert_eq!(3, info.descriptors()[0].record_num);
        assert_eq!(2, info.descriptors()[0].null_num);

        Ok(())
    }

    #[test]
    fn write_nulls_emits_n_in_a_row() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "n",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );
        let config = Config::with_capacity(4);

        {
            let mut writer =
                CabWriter::init2write(&base, &SchemaPath::from("n"), &schema, config.clone(), 0)?;
            writer.write_nulls(0, 0, 6)?;
        }

        let info = crate::cab::info::CabInfoBuffer::open(&crate::file::info_path(&crate::file::content_path(&base)))?;
        assert_eq!(2, info.len());
        assert_eq!(4, info.descriptors()[0].null_num);
        assert_eq!(2, info.descriptors()[1].null_num);

        Ok(())
    }

    #[test]
    fn rejects_writer_on_non_empty_column() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "n",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );
        let config = Config::with_capacity(4);

        {
            let mut writer =
                CabWriter::init2write(&base, &SchemaPath::from("n"), &schema, config.clone(), 0)?;
            writer.write_value(0, &Value::Int32(1))?;
            writer.flush()?;
        }

        let result = CabWriter::init2write(&base, &SchemaPath::from("n"), &schema, config, 0);
        assert!(result.is_err());

        Ok(())
    }
}
