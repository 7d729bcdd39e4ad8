// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Continues writing into an existing column session, repairing a partial
//! tail block in memory before accepting new items.

use crate::{
    cab::{
        block::{BlockType, CabBlock},
        info::CabInfo,
        layouter::CabLayouter,
        operator::Operator,
    },
    checksum::Checksum,
    config::Config,
    data_type::{DataType, Value},
    file,
    schema::{SchemaPath, SchemaTree},
};
use std::io::{Seek, SeekFrom, Write};

/// Appends records to a column a [`crate::cab::writer::CabWriter`] (or a
/// prior appender) already populated.
pub struct CabAppender {
    op: Operator,
    current: CabBlock,
}

impl CabAppender {
    /// Reopens a column session and prepares to continue writing after its
    /// last record.
    ///
    /// If the last flushed block was not full, its content is loaded,
    /// copied into a fresh scratch block, and the content file is truncated
    /// back to that block's start so the next flush overwrites it in place.
    /// The reconstructed tail is never reused as the live write target
    /// directly, only replayed into a fresh block.
    pub fn init2append(
        base_path: &std::path::Path,
        path: &SchemaPath,
        schema: &SchemaTree,
        config: Config,
    ) -> crate::Result<Self> {
        let mut op = Operator::init(base_path, path, schema, config)?;

        let capacity = op.info().capacity();
        let max_def = op.info().max_def();
        let data_type = op.info().data_type();

        let current = match op.info_mut().reopen_tail()? {
            Some(tail) => Self::reconstruct_tail(&mut op, &tail, capacity, max_def, data_type)?,
            None => {
                let next_bgn = op
                    .info()
                    .descriptors()
                    .last()
                    .map(|d| d.bgn_recd + d.record_num)
                    .unwrap_or(0);
                CabBlock::init2write(capacity, next_bgn, max_def, data_type)
            }
        };

        Ok(Self { op, current })
    }

    fn reconstruct_tail(
        op: &mut Operator,
        tail: &CabInfo,
        capacity: u64,
        max_def: u32,
        data_type: DataType,
    ) -> crate::Result<CabBlock> {
        // Scratch buffer: the block exactly as it was last flushed. Kept
        // separate from the block we hand back to the caller so that the
        // live write target is never the same allocation as the bytes we
        // just decoded off disk. A trivial tail has no content bytes to
        // read at all; its value comes back out of the descriptor's value
        // summary instead, same as `CabReader::prepare_cab`.
        let scratch = if tail.block_type == BlockType::Trivial {
            CabLayouter::deserialize(
                &[],
                op.config().compression,
                op.codec().kind(),
                tail.block_type,
                tail.item_num,
                capacity,
                tail.bgn_recd,
                max_def,
                data_type,
                tail.value_info.min(),
            )?
        } else {
            let bytes =
                file::read_exact_at(op.content_file_mut(), tail.file_off, tail.strg_size as usize)?;
            tail.checksum.check(Checksum::of(&bytes))?;

            CabLayouter::deserialize(
                &bytes,
                op.config().compression,
                op.codec().kind(),
                tail.block_type,
                tail.item_num,
                capacity,
                tail.bgn_recd,
                max_def,
                data_type,
                None,
            )?
        };

        file::truncate_to(op.content_file_mut(), tail.file_off)?;

        let mut fresh = CabBlock::init2write(capacity, tail.bgn_recd, max_def, data_type);
        fresh.copy_content(&scratch)?;
        Ok(fresh)
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
            "appender flushed block bgn_recd={} record_num={} item_num={}",
            info.bgn_recd,
            info.record_num,
            info.item_num
        );

        self.op.info_mut().append_block(info)
    }

    /// Flushes whatever the current (possibly partial) block holds.
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
impl CabAppender {
    /// Mirrors `CabWriter::flush_bloom_filter`: a column written with the
    /// `bloom` feature active keeps Bloom coverage for blocks flushed by an
    /// appender, not just its original writer.
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

impl Drop for CabAppender {
    fn drop(&mut self) {
        if let Err(e) = self.flush_current_block() {
            log::error!("failed to flush tail block on drop: {e}");
        }
    }
}
