// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The CAB (Column-Aligned Block) itself: the in-memory unit of one
//! column's shredded items.

use crate::{data_type::DataType, value_array::ValueArray};

/// How a block's content collapses, derived from what was actually written.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    /// Full value array present.
    Normal,
    /// All items null; only repetition/definition is stored.
    AllNull,
    /// All items share one value; content bytes are omitted entirely.
    Trivial,
}

impl BlockType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::AllNull => 1,
            Self::Trivial => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> crate::Result<Self> {
        match tag {
            0 => Ok(Self::Normal),
            1 => Ok(Self::AllNull),
            2 => Ok(Self::Trivial),
            _ => Err(crate::Error::Corruption("unknown block type tag")),
        }
    }
}

/// One decoded item read back out of a block.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnItem {
    /// Logical repetition level (already decoded through the column's codec).
    pub rep: u32,
    /// Definition level.
    pub def: u32,
    /// Value bytes, present only when `def == max_def` (non-null).
    pub value: Option<Vec<u8>>,
}

impl ColumnItem {
    /// `true` if this item is null at the leaf (`def < max_def`).
    #[must_use]
    pub fn is_null(&self, max_def: u32) -> bool {
        self.def < max_def
    }
}

/// A single column-aligned block: up to `capacity` records' worth of items
/// for one column.
#[derive(Clone, Debug)]
pub struct CabBlock {
    capacity: u64,
    bgn_recd: u64,
    max_def: u32,
    data_type: DataType,

    record_count: u64,
    item_count: u64,
    null_count: u64,

    /// Codec-encoded repetition, one per item.
    reps: Vec<u32>,
    /// Definition level, one per item.
    defs: Vec<u32>,
    /// Encoded values for non-null items, in item order.
    values: ValueArray,
}

impl CabBlock {
    /// Prepares a fresh block to be filled by a writer, beginning at `bgn_recd`.
    #[must_use]
    pub fn init2write(capacity: u64, bgn_recd: u64, max_def: u32, data_type: DataType) -> Self {
        Self {
            capacity,
            bgn_recd,
            max_def,
            data_type,
            record_count: 0,
            item_count: 0,
            null_count: 0,
            reps: Vec::new(),
            defs: Vec::new(),
            values: ValueArray::new(),
        }
    }

    /// Rehydrates a block for reading from already-decoded columns
    /// (the layouter calls this after deserializing content bytes).
    #[must_use]
    pub fn init2read(
        capacity: u64,
        bgn_recd: u64,
        max_def: u32,
        data_type: DataType,
        reps: Vec<u32>,
        defs: Vec<u32>,
        values: ValueArray,
    ) -> Self {
        let item_count = reps.len() as u64;
        let null_count = defs.iter().filter(|&&d| d < max_def).count() as u64;
        let record_count = reps.iter().filter(|&&r| r == 0).count() as u64;

        Self {
            capacity,
            bgn_recd,
            max_def,
            data_type,
            record_count,
            item_count,
            null_count,
            reps,
            defs,
            values,
        }
    }

    /// Attempts to append one item.
    ///
    /// `rep` must already be codec-encoded. Returns `1` on success, `0` if
    /// the block is full and this item would start a new record; a writer
    /// retries against a freshly prepared block in that case.
    pub fn write_item(&mut self, rep: u32, def: u32, value: Option<Vec<u8>>) -> i32 {
        if rep == 0 && self.record_count >= self.capacity {
            return 0;
        }

        if rep == 0 {
            self.record_count += 1;
        }

        self.reps.push(rep);
        self.defs.push(def);

        if def < self.max_def {
            self.null_count += 1;
        } else {
            #[allow(clippy::expect_used)]
            let value = value.expect("non-null item must carry a value");
            self.values.push(value);
        }

        self.item_count += 1;

        1
    }

    /// Replays every item of `other` into `self`, preserving exact order.
    ///
    /// Used by the appender to restore a writer's in-memory state before a
    /// tail block was ever flushed.
    pub fn copy_content(&mut self, other: &Self) -> crate::Result<()> {
        let mut value_cursor = 0;

        for i in 0..other.item_count as usize {
            let rep = other.reps[i];
            let def = other.defs[i];

            let value = if def < other.max_def {
                None
            } else {
                let v = other.values.get(value_cursor).to_vec();
                value_cursor += 1;
                Some(v)
            };

            if self.write_item(rep, def, value) == 0 {
                return Err(crate::Error::Corruption(
                    "tail block replay overflowed capacity",
                ));
            }
        }

        Ok(())
    }

    /// `true` once the block holds `capacity` records.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.record_count >= self.capacity
    }

    /// Number of complete records held.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Number of items (including nulls) held.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Number of null items held.
    #[must_use]
    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    /// First record id of this block.
    #[must_use]
    pub fn bgn_recd(&self) -> u64 {
        self.bgn_recd
    }

    /// Block capacity `C`.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The column's data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Definition level maximum for this column.
    #[must_use]
    pub fn max_def(&self) -> u32 {
        self.max_def
    }

    /// Codec-encoded repetition values, in item order.
    #[must_use]
    pub fn reps(&self) -> &[u32] {
        &self.reps
    }

    /// Definition levels, in item order.
    #[must_use]
    pub fn defs(&self) -> &[u32] {
        &self.defs
    }

    /// The non-null value array.
    #[must_use]
    pub fn values(&self) -> &ValueArray {
        &self.values
    }

    /// Reads one item by its in-block index.
    ///
    /// Returns `None` if `item_idx` is past the block's item count.
    #[must_use]
    pub fn read(&self, item_idx: u64) -> Option<ColumnItem> {
        let idx = item_idx as usize;
        if idx >= self.reps.len() {
            return None;
        }

        let rep = self.reps[idx];
        let def = self.defs[idx];

        let value = if def < self.max_def {
            None
        } else {
            let nonnull_idx = self.defs[..idx].iter().filter(|&&d| d >= self.max_def).count();
            Some(self.values.get(nonnull_idx).to_vec())
        };

        Some(ColumnItem { rep, def, value })
    }

    /// Computes this block's own min/max summary, to be folded into the
    /// column footer on flush.
    #[must_use]
    pub fn value_info(&self) -> crate::cab::info::ColumnValueInfo {
        let mut info = crate::cab::info::ColumnValueInfo::new();
        if self.data_type.is_fixed_size() {
            for v in self.values.as_slice() {
                info.observe(self.data_type, v);
            }
        }
        info
    }

    /// Classifies the block's content.
    ///
    /// `Trivial` additionally requires every item to sit at repetition 0
    /// (record-aligned, no nesting): a trivial block's content is omitted
    /// entirely on disk, so its repetition pattern must be as fully
    /// reconstructible from the descriptor alone as its value and
    /// definition levels already are.
    #[must_use]
    pub fn classify(&self) -> BlockType {
        if self.item_count > 0 && self.null_count == self.item_count {
            return BlockType::AllNull;
        }

        if self.data_type.is_fixed_size()
            && self.null_count == 0
            && self.item_count > 0
            && self.reps.iter().all(|&r| r == 0)
        {
            let first = self.values.get(0);
            if self.values.as_slice().iter().all(|v| v.as_slice() == first) {
                return BlockType::Trivial;
            }
        }

        BlockType::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::Value;
    use test_log::test;

    #[test]
    fn write_and_read_items() {
        let mut block = CabBlock::init2write(4, 0, 1, DataType::Int32);

        for v in [10, 20, 30, 40] {
            let bytes = DataType::Int32.encode_value(&Value::Int32(v));
            assert_eq!(1, block.write_item(0, 1, Some(bytes)));
        }

        // Block is full: a new record (rep=0) must be rejected.
        let bytes = DataType::Int32.encode_value(&Value::Int32(50));
        assert_eq!(0, block.write_item(0, 1, Some(bytes)));

        assert_eq!(4, block.record_count());
        assert_eq!(4, block.item_count());

        let item = block.read(2).expect("item exists");
        assert_eq!(
            Value::Int32(30),
            DataType::Int32.decode_value(&item.value.expect("non-null"))
        );
    }

    #[test]
    fn null_items_have_no_value() {
        let mut block = CabBlock::init2write(4, 0, 2, DataType::Int32);
        assert_eq!(1, block.write_item(0, 0, None));
        assert_eq!(1, block.null_count());

        let item = block.read(0).expect("item exists");
        assert!(item.is_null(2));
        assert!(item.value.is_none());
    }

    #[test]
    fn classify_all_null() {
        let mut block = CabBlock::init2write(2, 0, 2, DataType::Int32);
        block.write_item(0, 0, None);
        block.write_item(0, 0, None);
        assert_eq!(BlockType::AllNull, block.classify());
    }

    #[test]
    fn classify_trivial() {
        let mut block = CabBlock::init2write(3, 0, 1, DataType::Int32);
        let v = DataType::Int32.encode_value(&Value::Int32(7));
        for _ in 0..3 {
            block.write_item(0, 1, Some(v.clone()));
        }
        assert_eq!(BlockType::Trivial, block.classify());
    }

    #[test]
    fn classify_normal() {
        let mut block = CabBlock::init2write(2, 0, 1, DataType::Int32);
        block.write_item(0, 1, Some(DataType::Int32.encode_value(&Value::Int32(1))));
        block.write_item(0, 1, Some(DataType::Int32.encode_value(&Value::Int32(2))));
        assert_eq!(BlockType::Normal, block.classify());
    }

    #[test]
    fn copy_content_replays_exact_state() {
        let mut src = CabBlock::init2write(4, 8, 1, DataType::Int32);
        src.write_item(0, 1, Some(DataType::Int32.encode_value(&Value::Int32(1))));
        src.write_item(0, 0, None);
        src.write_item(0, 1, Some(DataType::Int32.encode_value(&Value::Int32(3))));

        let mut dst = CabBlock::init2write(4, 8, 1, DataType::Int32);
        dst.copy_content(&src).expect("replay succeeds");

        assert_eq!(src.item_count(), dst.item_count());
        assert_eq!(src.record_count(), dst.record_count());
        assert_eq!(src.null_count(), dst.null_count());

        for i in 0..3 {
            assert_eq!(src.read(i), dst.read(i));
        }
    }
}
