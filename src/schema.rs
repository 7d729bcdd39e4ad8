// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Minimal schema tree: provides repetition/definition maxima and a
//! data-type descriptor for each leaf column path.
//!
//! There is no surrounding catalog crate to resolve paths against here, so
//! this module ships a small flat registry: a [`SchemaTree`] maps a
//! [`SchemaPath`] to the facts a column session needs at `init` time.

use crate::data_type::DataType;
use std::collections::HashMap;

/// Identifies a leaf column by its dotted path through the record schema.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SchemaPath(Vec<String>);

impl SchemaPath {
    /// Builds a path from its dot-separated segments.
    #[must_use]
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Path segments, leaf-inclusive.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for SchemaPath {
    fn from(value: &str) -> Self {
        Self::new(value.split('.'))
    }
}

/// The facts a column session needs, resolved once at `init`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PathInfo {
    /// Leaf value type.
    pub data_type: DataType,
    /// Maximum repetition level along this path.
    pub max_rep: u32,
    /// Maximum definition level along this path.
    pub max_def: u32,
}

/// A flat registry of leaf paths.
#[derive(Clone, Debug, Default)]
pub struct SchemaTree {
    paths: HashMap<SchemaPath, PathInfo>,
}

impl SchemaTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a leaf path.
    pub fn register(&mut self, path: SchemaPath, info: PathInfo) -> &mut Self {
        self.paths.insert(path, info);
        self
    }

    /// Resolves a path's repetition/definition maxima and data type.
    ///
    /// Fails if the path does not exist.
    pub fn resolve(&self, path: &SchemaPath) -> crate::Result<PathInfo> {
        self.paths
            .get(path)
            .copied()
            .ok_or(crate::Error::Schema("path does not exist in schema tree"))
    }
}
