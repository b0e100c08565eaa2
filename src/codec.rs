//! Binary codec layer: block compression and flat archive I/O.
//!
//! Entries inside a container carry their own zstd compression, so the
//! zip layer stores them uncompressed. Writes are atomic: content goes
//! to a temp file, is synced to disk, then renamed over the target path,
//! so a crash mid-write never leaves a half-written container behind.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Block-compress a byte blob. `decompress(compress(x)) == x` for all x,
/// including empty input.
///
/// # Errors
///
/// Returns an error if the encoder fails, which for in-memory input only
/// happens on allocation failure.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    Ok(zstd::stream::encode_all(bytes, 0)?)
}

/// Inverse of [`compress`].
///
/// # Errors
///
/// Returns an error if the input is not a valid zstd frame.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    Ok(zstd::stream::decode_all(bytes)?)
}

/// Open a container and return every named entry as raw bytes.
///
/// # Errors
///
/// Returns [`Error::CorruptArchive`] if the file cannot be opened or
/// parsed as an entry-addressable archive.
pub fn read_archive(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let file = File::open(path).map_err(|e| Error::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("cannot open: {e}"),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("not a valid archive: {e}"),
    })?;

    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| Error::CorruptArchive {
            path: path.to_path_buf(),
            reason: format!("unreadable entry {index}: {e}"),
        })?;
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| Error::CorruptArchive {
                path: path.to_path_buf(),
                reason: format!("truncated entry '{}': {e}", entry.name()),
            })?;
        entries.insert(entry.name().to_string(), bytes);
    }

    tracing::debug!(path = %path.display(), entries = entries.len(), "read container");
    Ok(entries)
}

/// Write a new container atomically.
///
/// Writes every entry to a temp file next to the target, syncs it to
/// disk, then renames it into place. The previous container (if any)
/// remains intact if any step fails.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn write_archive(path: &Path, entries: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = ZipWriter::new(file);
        // Entries are pre-compressed; store them as-is.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, bytes) in entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| Error::Other(format!("cannot start entry '{name}': {e}")))?;
            writer.write_all(bytes)?;
        }

        let file = writer
            .finish()
            .map_err(|e| Error::Other(format!("cannot finalize archive: {e}")))?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "wrote container");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compress_round_trip() {
        let data = b"a small domesticated animal".to_vec();
        let packed = compress(&data).unwrap();
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_compress_round_trip_empty() {
        let packed = compress(&[]).unwrap();
        assert_eq!(decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_archive_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.apkg");

        let mut entries = BTreeMap::new();
        entries.insert("media".to_string(), br#"{"0":"cat.mp3"}"#.to_vec());
        entries.insert("0".to_string(), vec![1, 2, 3]);

        write_archive(&path, &entries).unwrap();
        let read_back = read_archive(&path).unwrap();
        assert_eq!(read_back, entries);
    }

    #[test]
    fn test_read_archive_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.apkg");
        fs::write(&path, b"this is not an archive").unwrap();

        let err = read_archive(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { .. }));
    }

    #[test]
    fn test_write_replaces_existing_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.apkg");

        let mut first = BTreeMap::new();
        first.insert("media".to_string(), b"{}".to_vec());
        write_archive(&path, &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("media".to_string(), br#"{"0":"dog.mp3"}"#.to_vec());
        write_archive(&path, &second).unwrap();

        let read_back = read_archive(&path).unwrap();
        assert_eq!(read_back, second);
        assert!(!path.with_extension("tmp").exists());
    }
}
