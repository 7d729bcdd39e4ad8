// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A Column-Aligned Block (CAB) storage engine.
//!
//! A column session (see [`cab`]) shreds one schema path's values into
//! fixed-capacity blocks, each carrying its own repetition/definition arrays
//! and a typed value array, so a single column can be written, appended to,
//! and read back independently of every other column in a record's schema.
//!
//! [`cab::CabWriter`] starts a brand new column; [`cab::CabAppender`]
//! reopens one and repairs a partial tail block before accepting further
//! writes; [`cab::CabReader`] locates and reads records back out, with
//! predicate pushdown over each block's min/max summary (and, behind the
//! `bloom` feature, a per-block Bloom filter).

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cab;
mod checksum;
mod coding;
mod compression;
mod config;
mod data_type;
mod error;
mod file;
mod repetition;
mod schema;
mod value_array;

#[cfg(feature = "bloom")]
mod bloom;

pub use cab::{CabAppender, CabBlock, CabInfo, CabReader, CabWriter, ColumnItem};
pub use checksum::Checksum;
pub use coding::{Decode, DecodeError, Encode, EncodeError};
pub use compression::CompressionType;
pub use config::Config;
pub use data_type::{DataType, Value};
pub use error::{Error, Result};
pub use schema::{PathInfo, SchemaPath, SchemaTree};

#[cfg(feature = "bloom")]
pub use bloom::BloomFilter;
#[cfg(feature = "bloom")]
pub use config::BloomConstructionPolicy;
