// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The CAB (Column-Aligned Block) engine: one column session's writer,
//! appender, reader, and their shared machinery.

pub mod appender;
pub mod block;
pub mod info;
pub mod layouter;
pub mod operator;
pub mod reader;
pub mod writer;

pub use appender::CabAppender;
pub use block::{BlockType, CabBlock, ColumnItem};
pub use info::{CabInfo, CabInfoBuffer, ColumnValueInfo};
pub use reader::CabReader;
pub use writer::CabWriter;
