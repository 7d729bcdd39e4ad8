// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::compression::CompressionType;

/// Per-session configuration, passed explicitly into every `init2*` call.
///
/// Block capacity and memory alignment are modeled as an explicit,
/// read-only config object rather than global state.
#[derive(Clone, Debug)]
pub struct Config {
    /// Block capacity `C`: records per CAB.
    pub cab_record_capacity: u64,

    /// Compression used for block content.
    pub compression: CompressionType,

    /// Byte alignment used when placing the optional Bloom filter payload.
    pub mem_alignment: u64,

    /// Bloom filter construction policy (only consulted when the `bloom`
    /// feature is enabled and the caller opts in).
    #[cfg(feature = "bloom")]
    pub bloom_policy: BloomConstructionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cab_record_capacity: 4_096,
            compression: CompressionType::None,
            mem_alignment: 8,
            #[cfg(feature = "bloom")]
            bloom_policy: BloomConstructionPolicy::default(),
        }
    }
}

impl Config {
    /// Creates a config with the given block capacity, otherwise defaulted.
    #[must_use]
    pub fn with_capacity(cab_record_capacity: u64) -> Self {
        Self {
            cab_record_capacity,
            ..Self::default()
        }
    }

    /// Sets the compression type.
    #[must_use]
    pub fn use_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }
}

/// How many bits to spend per key when a writer decides to build a Bloom
/// filter for a block.
#[cfg(feature = "bloom")]
#[derive(Copy, Clone, Debug)]
pub enum BloomConstructionPolicy {
    /// Fixed bits-per-key; `0` disables Bloom construction entirely.
    BitsPerKey(u8),
    /// Target false-positive rate.
    FpRate(f32),
}

#[cfg(feature = "bloom")]
impl Default for BloomConstructionPolicy {
    fn default() -> Self {
        Self::BitsPerKey(0)
    }
}

#[cfg(feature = "bloom")]
impl BloomConstructionPolicy {
    /// Returns `true` if this policy actually builds a filter.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::BitsPerKey(bpk) => *bpk > 0,
            Self::FpRate(_) => true,
        }
    }
}
