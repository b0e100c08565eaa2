//! Media index: integer keys to filenames, plus staged payloads.
//!
//! Keys are allocated as `max + 1` (0 for an empty index) and never
//! reused: the engine is additive-only, so a key freed by a hypothetical
//! deletion would still stay retired. Payloads carried over from an
//! existing container stay in their compressed form so they are copied
//! through byte-for-byte.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Payload staged for the archive assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// Raw bytes from the pipeline, compressed at assembly time.
    Raw(Vec<u8>),
    /// Already-compressed bytes from an existing container, written as-is.
    PreCompressed(Vec<u8>),
}

/// One indexed media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub filename: String,
    pub payload: MediaPayload,
}

/// Mapping from small integer keys to stored filenames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaIndex {
    entries: BTreeMap<u32, MediaEntry>,
}

impl MediaIndex {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Rebuild an index from a container's JSON manifest and its numbered
    /// entries. Payloads stay compressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is not a JSON object of string
    /// keys to filenames, or a listed payload entry is absent.
    pub fn from_manifest(
        manifest: &[u8],
        payloads: &BTreeMap<String, Vec<u8>>,
    ) -> Result<Self> {
        let mapping: BTreeMap<String, String> = serde_json::from_slice(manifest)?;
        let mut index = Self::new();
        for (key_str, filename) in mapping {
            let key: u32 = key_str
                .parse()
                .map_err(|_| Error::Other(format!("non-numeric media key '{key_str}'")))?;
            let payload = payloads
                .get(&key_str)
                .ok_or_else(|| Error::Other(format!("media entry '{key_str}' has no payload")))?;
            index.entries.insert(
                key,
                MediaEntry {
                    filename,
                    payload: MediaPayload::PreCompressed(payload.clone()),
                },
            );
        }
        Ok(index)
    }

    /// Next free key: one past the current maximum, 0 when empty.
    #[must_use]
    pub fn next_key(&self) -> u32 {
        self.entries.last_key_value().map_or(0, |(key, _)| key + 1)
    }

    /// Store a new filename mapping and stage its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateFilename`] if the filename already maps
    /// to a different key, and an internal error if the key is occupied
    /// (keys come from [`Self::next_key`], so that never happens in
    /// normal operation).
    pub fn register(&mut self, key: u32, filename: &str, bytes: Vec<u8>) -> Result<()> {
        if let Some(existing_key) = self.key_for_filename(filename) {
            if existing_key != key {
                return Err(Error::DuplicateFilename {
                    filename: filename.to_string(),
                    existing_key,
                });
            }
        }
        if self.entries.contains_key(&key) {
            return Err(Error::Other(format!("media key {key} already allocated")));
        }
        self.entries.insert(
            key,
            MediaEntry {
                filename: filename.to_string(),
                payload: MediaPayload::Raw(bytes),
            },
        );
        Ok(())
    }

    /// Key currently mapped to `filename`, if any.
    #[must_use]
    pub fn key_for_filename(&self, filename: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.filename == filename)
            .map(|(key, _)| *key)
    }

    /// The JSON manifest: string key to filename.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn manifest_json(&self) -> Result<Vec<u8>> {
        let mapping: BTreeMap<String, &str> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.filename.as_str()))
            .collect();
        Ok(serde_json::to_vec(&mapping)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &MediaEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
