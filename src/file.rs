// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

/// Magic bytes stamped at the start of every block and the info file header.
pub const MAGIC_BYTES: [u8; 4] = [b'C', b'A', b'B', 1];

/// Content file extension, appended to the column's base path.
pub const CONTENT_EXT: &str = "cab";

/// Info file extension, appended to the content file name.
pub const INFO_EXT: &str = "info";

/// Builds the content file path for a column session rooted at `base`
/// (e.g. `columns/user.tags` -> `columns/user.tags.cab`).
#[must_use]
pub fn content_path(base: &Path) -> std::path::PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(CONTENT_EXT);
    name.into()
}

/// Builds the info file path for a given content file path
/// (`columns/user.tags.cab` -> `columns/user.tags.cab.info`).
#[must_use]
pub fn info_path(content_path: &Path) -> std::path::PathBuf {
    let mut name = content_path.as_os_str().to_os_string();
    name.push(".");
    name.push(INFO_EXT);
    name.into()
}

/// Reads exactly `size` bytes at `offset`, without disturbing the file's cursor
/// for callers that track their own position separately.
pub fn read_exact_at(file: &mut File, offset: u64, size: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Truncates `file` to `len` bytes.
///
/// Used on session open to recover from a crash between a block content
/// flush and its descriptor append: the content file may be longer than what
/// the last known-good descriptor accounts for.
pub fn truncate_to(file: &File, len: u64) -> std::io::Result<()> {
    file.set_len(len)
}

/// Atomically replaces the first `old_prefix_len` bytes of `path` with
/// `new_content`, preserving everything after that offset untouched.
///
/// Used to rewrite the info file's header + column footer prefix whenever
/// the column-wide value summary changes (see [`crate::cab::info`]). The old
/// prefix length is passed explicitly rather than inferred from
/// `new_content`'s length, since the header can grow or shrink (e.g. a
/// variable-size column's min/max bytes) between rewrites.
pub fn rewrite_prefix_atomic(
    path: &Path,
    old_prefix_len: u64,
    new_content: &[u8],
) -> std::io::Result<()> {
    let folder = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(new_content)?;

    // Preserve the remainder of the file past the old prefix (descriptor array).
    if let Ok(mut existing) = File::open(path) {
        let existing_len = existing.metadata()?.len();
        if existing_len > old_prefix_len {
            existing.seek(SeekFrom::Start(old_prefix_len))?;
            let mut rest = Vec::new();
            existing.read_to_end(&mut rest)?;
            temp_file.write_all(&rest)?;
        }
    }

    temp_file.flush()?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn path_helpers_append_extensions() {
        let base = Path::new("columns/user.tags");
        let content = content_path(base);
        assert_eq!(Path::new("columns/user.tags.cab"), content);
        assert_eq!(Path::new("columns/user.tags.cab.info"), info_path(&content));
    }

    #[test]
    fn rewrite_preserves_suffix() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.bin");

        std::fs::write(&path, b"AAAABBBB")?;
        rewrite_prefix_atomic(&path, 4, b"CCCC")?;

        let content = std::fs::read(&path)?;
        assert_eq!(b"CCCCBBBB".to_vec(), content);

        Ok(())
    }

    #[test]
    fn rewrite_handles_growing_prefix() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.bin");

        std::fs::write(&path, b"AABBBB")?;
        rewrite_prefix_atomic(&path, 2, b"CCCCCC")?;

        let content = std::fs::read(&path)?;
        assert_eq!(b"CCCCCCBBBB".to_vec(), content);

        Ok(())
    }

    #[test]
    fn read_exact_at_roundtrip() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.bin");
        std::fs::write(&path, b"0123456789")?;

        let mut file = File::open(&path)?;
        let buf = read_exact_at(&mut file, 3, 4)?;
        assert_eq!(b"3456".to_vec(), buf);

        Ok(())
    }
}
