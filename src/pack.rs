//! Container packaging: create and update operations, plus the archive
//! assembler that lays out the final entry set.
//!
//! The engine never mutates a container in place: it reads the old one,
//! merges in memory, and writes a complete new archive atomically.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::codec;
use crate::error::{Error, Result};
use crate::factory::WordEntry;
use crate::media::{MediaIndex, MediaPayload};
use crate::merge::{merge, BatchReport, ExistingState, MergeOutcome};
use crate::model::{
    deck_id_for_name, COLLECTION_ENTRY, LEGACY_COLLECTION_ENTRY, MEDIA_ENTRY,
};
use crate::storage::CollectionDb;

/// Builds new containers and merges batches into existing ones.
#[derive(Debug)]
pub struct Packager {
    deck_id: i64,
}

impl Packager {
    /// Target the deck derived from `deck_name`. Updates keep the deck
    /// already recorded in the container instead.
    #[must_use]
    pub fn new(deck_name: &str) -> Self {
        Self {
            deck_id: deck_id_for_name(deck_name),
        }
    }

    /// Build a container from scratch at `output`.
    ///
    /// # Errors
    ///
    /// Fails if no candidate in the batch is accepted (a container with
    /// zero notes is never written), or on any archive/database fault.
    /// Per-item failures land in the returned report.
    pub fn create(&self, output: &Path, batch: &[WordEntry]) -> Result<BatchReport> {
        let outcome = merge(ExistingState::default(), batch, self.deck_id)?;
        if outcome.report.is_all_skipped() {
            return Err(Error::Validation {
                field: "batch",
                reason: "cannot build a container with no accepted notes".to_string(),
            });
        }

        let entries = assemble(&outcome)?;
        codec::write_archive(output, &entries)?;
        info!(
            path = %output.display(),
            notes = outcome.notes.len(),
            "created container"
        );
        Ok(outcome.report)
    }

    /// Merge a batch into the container at `container`, writing the
    /// result to `output` (the two paths may be equal).
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CorruptArchive`] if the existing container
    /// cannot be parsed — it never silently falls back to a fresh build,
    /// since that would discard study history.
    pub fn update(&self, container: &Path, output: &Path, batch: &[WordEntry]) -> Result<BatchReport> {
        let existing = read_existing(container)?;
        let outcome = merge(existing, batch, self.deck_id)?;

        let entries = assemble(&outcome)?;
        codec::write_archive(output, &entries)?;
        info!(
            path = %output.display(),
            notes = outcome.notes.len(),
            accepted = outcome.report.accepted.len(),
            skipped = outcome.report.skipped_duplicates.len(),
            "updated container"
        );
        Ok(outcome.report)
    }
}

/// Parse an existing container into merge input.
fn read_existing(path: &Path) -> Result<ExistingState> {
    let entries = codec::read_archive(path)?;

    let compressed_db = entries.get(COLLECTION_ENTRY).ok_or_else(|| Error::MissingEntry {
        path: path.to_path_buf(),
        entry: COLLECTION_ENTRY.to_string(),
    })?;
    let db_bytes = codec::decompress(compressed_db).map_err(|e| Error::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("primary database entry is not valid zstd: {e}"),
    })?;
    let db = CollectionDb::load_from_bytes(&db_bytes).map_err(|e| Error::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("embedded database unreadable: {e}"),
    })?;

    let manifest = entries.get(MEDIA_ENTRY).ok_or_else(|| Error::MissingEntry {
        path: path.to_path_buf(),
        entry: MEDIA_ENTRY.to_string(),
    })?;
    let media = MediaIndex::from_manifest(manifest, &entries).map_err(|e| {
        Error::CorruptArchive {
            path: path.to_path_buf(),
            reason: format!("media index unreadable: {e}"),
        }
    })?;

    Ok(ExistingState {
        notes: db.list_notes()?,
        cards: db.list_cards()?,
        media,
    })
}

/// Serialize a merge outcome into the container's fixed entry layout:
/// the compressed primary database, an empty legacy placeholder, the
/// JSON media index, and one compressed entry per media key.
fn assemble(outcome: &MergeOutcome) -> Result<BTreeMap<String, Vec<u8>>> {
    let db = CollectionDb::open_or_create_empty()?;
    for note in &outcome.notes {
        db.insert_note(note)?;
    }
    for card in &outcome.cards {
        db.insert_card(card)?;
    }

    let mut entries = BTreeMap::new();
    entries.insert(COLLECTION_ENTRY.to_string(), codec::compress(&db.serialize()?)?);

    // Present only so older readers recognize the file; never populated.
    let legacy = CollectionDb::open_or_create_empty()?;
    entries.insert(LEGACY_COLLECTION_ENTRY.to_string(), legacy.serialize()?);

    entries.insert(MEDIA_ENTRY.to_string(), outcome.media.manifest_json()?);

    for (key, media_entry) in outcome.media.iter() {
        let payload = match &media_entry.payload {
            MediaPayload::Raw(bytes) => codec::compress(bytes)?,
            MediaPayload::PreCompressed(bytes) => bytes.clone(),
        };
        entries.insert(key.to_string(), payload);
    }

    Ok(entries)
}
