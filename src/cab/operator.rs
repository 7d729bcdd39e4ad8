// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Shared base embedded by value in [`crate::cab::writer::CabWriter`],
//! [`crate::cab::reader::CabReader`] and [`crate::cab::appender::CabAppender`],
//! concrete rather than behind a trait object.

use crate::{
    cab::info::CabInfoBuffer,
    config::Config,
    file,
    repetition::RepetitionCodec,
    schema::{SchemaPath, SchemaTree},
};
use std::{
    fs::{File, OpenOptions},
    path::PathBuf,
};

/// Facts and open handles common to every CAB session on one column.
pub struct Operator {
    content_path: PathBuf,
    content_file: File,
    info: CabInfoBuffer,
    codec: RepetitionCodec,
    config: Config,
}

impl Operator {
    /// Resolves `path` against `schema`, opens (or creates) the column's
    /// content and info files rooted at `base_path`, and recovers from any
    /// incomplete flush left by a prior crash.
    pub fn init(
        base_path: &std::path::Path,
        path: &SchemaPath,
        schema: &SchemaTree,
        config: Config,
    ) -> crate::Result<Self> {
        let path_info = schema.resolve(path)?;

        let content_path = file::content_path(base_path);
        let info_path = file::info_path(&content_path);

        let info = if info_path.exists() {
            let info = CabInfoBuffer::open(&info_path)?;
            if info.capacity() != config.cab_record_capacity {
                return Err(crate::Error::Schema(
                    "config capacity does not match the column's persisted block capacity",
                ));
            }
            info
        } else {
            if config.cab_record_capacity == 0 {
                return Err(crate::Error::Schema("block capacity must be nonzero"));
            }
            CabInfoBuffer::create(
                &info_path,
                path_info.data_type,
                path_info.max_rep,
                path_info.max_def,
                config.cab_record_capacity,
                crate::repetition::RepetitionKind::for_max_rep(path_info.max_rep),
                config.compression,
            )?
        };

        let mut content_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&content_path)?;

        if let Some(last) = info.last() {
            let safe_len = last.file_off + last.strg_size + last.bloom_size;
            let actual_len = content_file.metadata()?.len();
            if actual_len > safe_len {
                log::warn!(
                    "content file longer ({actual_len}) than last known-good descriptor \
                     accounts for ({safe_len}); truncating to recover from an incomplete flush"
                );
                file::truncate_to(&content_file, safe_len)?;
            }
        } else if content_file.metadata()?.len() > 0 {
            log::warn!("content file non-empty with no descriptors; truncating to zero");
            file::truncate_to(&content_file, 0)?;
        }

        let codec = RepetitionCodec::of_kind(info.rep_kind());

        Ok(Self {
            content_path,
            content_file,
            info,
            codec,
            config,
        })
    }

    /// The content file path.
    #[must_use]
    pub fn content_path(&self) -> &std::path::Path {
        &self.content_path
    }

    /// Mutable access to the open content file.
    pub fn content_file_mut(&mut self) -> &mut File {
        &mut self.content_file
    }

    /// Shared access to the info buffer.
    #[must_use]
    pub fn info(&self) -> &CabInfoBuffer {
        &self.info
    }

    /// Mutable access to the info buffer.
    pub fn info_mut(&mut self) -> &mut CabInfoBuffer {
        &mut self.info
    }

    /// The column's repetition codec.
    #[must_use]
    pub fn codec(&self) -> RepetitionCodec {
        self.codec
    }

    /// The session's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current length of the content file.
    pub fn content_len(&mut self) -> crate::Result<u64> {
        Ok(self.content_file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::schema::PathInfo;
    use test_log::test;

    fn schema_with(path: &str, info: PathInfo) -> SchemaTree {
        let mut tree = SchemaTree::new();
        tree.register(SchemaPath::from(path), info);
        tree
    }

    #[test]
    fn init_creates_fresh_session() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "a.b",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );

        let op = Operator::init(&base, &SchemaPath::from("a.b"), &schema, Config::default())?;
        assert_eq!(0, op.info().len());
        assert!(op.content_path().exists());

        Ok(())
    }

    #[test]
    fn init_recovers_from_truncated_descriptor() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "a.b",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );

        {
            let op = Operator::init(&base, &SchemaPath::from("a.b"), &schema, Config::default())?;
            drop(op);
        }

        // Simulate a crash: content bytes were written but no descriptor
        // was ever appended to account for them.
        let content_path = file::content_path(&base);
        std::fs::write(&content_path, b"stray partial block bytes")?;

        let mut op = Operator::init(&base, &SchemaPath::from("a.b"), &schema, Config::default())?;
        assert_eq!(0, op.content_len()?);

        Ok(())
    }

    #[test]
    fn init_rejects_zero_capacity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("col");
        let schema = schema_with(
            "a.b",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );

        let result = Operator::init(
            &base,
            &SchemaPath::from("a.b"),
            &schema,
            Config::with_capacity(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn reopen_rejects_capacity_mismatch() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("col");
        let schema = schema_with(
            "a.b",
            PathInfo {
                data_type: DataType::Int32,
                max_rep: 0,
                max_def: 1,
            },
        );

        {
            let op = Operator::init(
                &base,
                &SchemaPath::from("a.b"),
                &schema,
                Config::with_capacity(4),
            )?;
            drop(op);
        }

        let result = Operator::init(
            &base,
            &SchemaPath::from("a.b"),
            &schema,
            Config::with_capacity(8),
        );
        assert!(result.is_err());

        Ok(())
    }
}
