// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Reads records back out of a column session.

use crate::{
    cab::{
        block::{BlockType, ColumnItem},
        info::CabInfo,
        layouter::CabLayouter,
        operator::Operator,
    },
    config::Config,
    file,
    schema::{SchemaPath, SchemaTree},
};
use std::cmp::Ordering;

/// Reads records from an existing column session, locating the block that
/// covers a given record id and navigating items within it.
pub struct CabReader {
    op: Operator,
    cached: Option<(usize, crate::cab::block::CabBlock)>,
}

impl CabReader {
    /// Opens a column session for reading.
    pub fn init2read(
        base_path: &std::path::Path,
        path: &SchemaPath,
        schema: &SchemaTree,
        config: Config,
    ) -> crate::Result<Self> {
        let op = Operator::init(base_path, path, schema, config)?;
        Ok(Self { op, cached: None })
    }

    /// Number of blocks in the column.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.op.info().len()
    }

    /// Total number of records across all blocks.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.op
            .info()
            .descriptors()
            .iter()
            .map(|d| d.record_num)
            .sum()
    }

    /// Finds the index of the block covering `record_id`.
    pub fn calc_cab_index(&self, record_id: u64) -> crate::Result<usize> {
        self.op
            .info()
            .descriptors()
            .binary_search_by(|d| Self::compare_cab_index4record(d, record_id))
            .map_err(|_| crate::Error::Bounds("record id not covered by any block"))
    }

    /// Orders a descriptor relative to `record_id`: `Equal` when the
    /// descriptor's record range covers `record_id`.
    fn compare_cab_index4record(info: &CabInfo, record_id: u64) -> Ordering {
        if record_id < info.bgn_recd {
            Ordering::Greater
        } else if record_id >= info.bgn_recd + info.record_num {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// Loads block `idx` into the single-block cache if not already current.
    fn prepare_cab(&mut self, idx: usize) -> crate::Result<()> {
        if let Some((cur, _)) = &self.cached {
            if *cur == idx {
                return Ok(());
            }
        }

        let info = self
            .op
            .info()
            .descriptors()
            .get(idx)
            .ok_or(crate::Error::Bounds("block index out of range"))?
            .clone();

        // A trivial block's content file region is empty: skip the seek,
        // read, and checksum entirely rather than fetch zero bytes, mirroring
        // `original_source/CABReader.cpp`'s `prepareNextCAB`, which never
        // calls `prepareBinCont` for a trivial block.
        let block = if info.block_type == BlockType::Trivial {
            CabLayouter::deserialize(
                &[],
                self.op.config().compression,
                self.op.codec().kind(),
                info.block_type,
                info.item_num,
                self.op.info().capacity(),
                info.bgn_recd,
                self.op.info().max_def(),
                self.op.info().data_type(),
                info.value_info.min(),
            )?
        } else {
            let bytes = file::read_exact_at(
                self.op.content_file_mut(),
                info.file_off,
                info.strg_size as usize,
            )?;

            let checksum = crate::checksum::Checksum::of(&bytes);
            info.checksum.check(checksum)?;

            CabLayouter::deserialize(
                &bytes,
                self.op.config().compression,
                self.op.codec().kind(),
                info.block_type,
                info.item_num,
                self.op.info().capacity(),
                info.bgn_recd,
                self.op.info().max_def(),
                self.op.info().data_type(),
                None,
            )?
        };

        self.cached = Some((idx, block));
        Ok(())
    }

    /// Loads the block covering `record_id`, returning its index.
    pub fn load_cab4record(&mut self, record_id: u64) -> crate::Result<usize> {
        let idx = self.calc_cab_index(record_id)?;
        self.prepare_cab(idx)?;
        Ok(idx)
    }

    /// Returns the `[begin, end)` item-index range of `record_id` within its
    /// block.
    pub fn get_recd_range(&mut self, record_id: u64) -> crate::Result<(u64, u64)> {
        self.load_cab4record(record_id)?;
        let block = &self.cached.as_ref().expect("just loaded").1;
        let target = record_id - block.bgn_recd();

        let mut begin = None;
        let mut end = block.item_count();
        let mut seen = 0u64;

        for (i, &rep) in block.reps().iter().enumerate() {
            if rep == 0 {
                if seen == target {
                    begin = Some(i as u64);
                } else if seen == target + 1 {
                    end = i as u64;
                    break;
                }
                seen += 1;
            }
        }

        let begin = begin.ok_or(crate::Error::Bounds("record not present in its own block"))?;
        Ok((begin, end))
    }

    /// First item index of `record_id`.
    pub fn get_recd_begin_item_idx(&mut self, record_id: u64) -> crate::Result<u64> {
        self.get_recd_range(record_id).map(|(begin, _)| begin)
    }

    /// Walks `record_id`'s nested structure per `vidx`, a per-depth-level
    /// child-index path: `vidx[0]` is the index of the level-1 (first
    /// nesting depth) child to descend into, `vidx[1]` the level-2 child
    /// within that, and so on.
    ///
    /// At each level `l` (expected decoded repetition `l + 1`), items are
    /// scanned forward from the current position, counting those whose
    /// decoded repetition equals exactly `l + 1`, until `vidx[l]` such
    /// occurrences have been seen; items with a deeper repetition are
    /// skipped over (they belong to a grandchild, not a sibling). A
    /// decoded repetition below `l + 1` means the scan has walked back out
    /// of the current group without finding the requested child, which is
    /// an error, as is walking past the record's own end — mirroring
    /// `original_source/CABReader_inline.h::getSpecificItemIdx`, bounded
    /// against the record's own end so a request past what the record
    /// actually holds errors out instead of scanning into the next record.
    pub fn get_specific_item_idx(&mut self, record_id: u64, vidx: &[u32]) -> crate::Result<u64> {
        let (begin, end) = self.get_recd_range(record_id)?;
        let codec = self.op.codec();
        let block = &self.cached.as_ref().expect("just loaded").1;

        let mut idx = begin;
        for (level, &target) in vidx.iter().enumerate() {
            let expected = level as u32 + 1;
            let mut count = 0u32;
            while count < target {
                idx += 1;
                if idx >= end {
                    return Err(crate::Error::Bounds(
                        "occurrence index past the end of its record",
                    ));
                }
                let rep = codec.decode(block.reps()[idx as usize]);
                if rep < expected {
                    return Err(crate::Error::Bounds(
                        "record structure does not have that child",
                    ));
                } else if rep == expected {
                    count += 1;
                }
            }
        }

        Ok(idx)
    }

    /// Advances `count` records past `from_record`, returning the first item
    /// index of the resulting record.
    pub fn skip_recds(&mut self, from_record: u64, count: u64) -> crate::Result<u64> {
        self.get_recd_begin_item_idx(from_record + count)
    }

    /// Reads one item at `item_idx` from the currently prepared block,
    /// decoding its repetition level back to a logical value.
    pub fn read(&mut self, item_idx: u64) -> crate::Result<ColumnItem> {
        let codec = self.op.codec();
        let (_, block) = self.cached.as_ref().ok_or(crate::Error::State(
            "no block prepared; call load_cab4record first",
        ))?;

        let mut item = block
            .read(item_idx)
            .ok_or(crate::Error::Bounds("item index out of range"))?;
        item.rep = codec.decode(item.rep);
        Ok(item)
    }

    /// Reads every item of `record_id`, in order, with decoded repetition
    /// levels.
    pub fn read_record(&mut self, record_id: u64) -> crate::Result<Vec<ColumnItem>> {
        let (begin, end) = self.get_recd_range(record_id)?;
        (begin..end).map(|idx| self.read(idx)).collect()
    }

    /// `true` if block `idx`'s observed min/max range could contain `value`.
    ///
    /// Always `true` for variable-size columns, which never populate
    /// min/max, and for any block that never saw a value.
    #[must_use]
    pub fn block_might_contain(&self, idx: usize, value: &[u8]) -> bool {
        let Some(info) = self.op.info().descriptors().get(idx) else {
            return false;
        };
        let data_type = self.op.info().data_type();

        match (info.value_info.min(), info.value_info.max()) {
            (Some(min), Some(max)) => {
                data_type.compare_not_less(value, min) && data_type.compare_not_greater(value, max)
            }
            _ => true,
        }
    }

    /// Indices of blocks that could possibly contain `value`, via the
    /// column-wide and per-block value summaries (non-Bloom predicate
    /// pushdown path).
    #[must_use]
    pub fn candidate_blocks(&self, value: &[u8]) -> Vec<usize> {
        (0..self.block_count())
            .filter(|&idx| self.block_might_contain(idx, value))
            .collect()
    }
}

#[cfg(feature = "bloom")]
use crate::coding::Decode;

#[cfg(feature = "bloom")]
impl CabReader {
    /// `true` if block `idx`'s Bloom filter (if any) may contain `value`.
    ///
    /// A block with no Bloom filter attached is always a candidate: a
    /// Bloom filter only ever narrows the candidate set, it never has to
    /// exist.
    pub fn is_candidate(&mut self, idx: usize, value: &[u8]) -> crate::Result<bool> {
        let info = self
            .op
            .info()
            .descriptors()
            .get(idx)
            .ok_or(crate::Error::Bounds("block index out of range"))?
            .clone();

        if info.bloom_size == 0 {
            return Ok(true);
        }

        let bytes = file::read_exact_at(
            self.op.content_file_mut(),
            info.bloom_off(),
            info.bloom_size as usize,
        )?;
        let filter = crate::bloom::BloomFilter::decode_from(&mut std::io::Cursor::new(bytes))?;
        Ok(filter.contains(value))
    }
}
