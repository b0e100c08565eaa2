//! Note row type: one flashcard's content, independent of study state.

use serde::{Deserialize, Serialize};

use crate::model::FIELD_SEPARATOR;

/// One note row as stored in the `notes` table.
///
/// `id` doubles as a creation-timestamp proxy (milliseconds, strictly
/// increasing within a batch). `(model_id, checksum)` is the
/// de-duplication key: two notes with equal checksum under the same model
/// are the same logical card during merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    /// Short random identifier, stable across merges of the same container.
    pub guid: String,
    pub model_id: i64,
    /// Last-modified time in seconds.
    pub modified: i64,
    pub usn: i32,
    /// Space-joined tag list. Always empty for this engine's output.
    pub tags: String,
    /// Ordered field contents (Audio, Definition, Word).
    pub fields: Vec<String>,
    /// Copy of the first field, used for default display ordering.
    pub sort_field: String,
    /// 32-bit digest of the first field; the dedup key with `model_id`.
    pub checksum: u32,
    pub flags: i32,
    pub data: String,
}

impl Note {
    /// Fields joined with the storage separator.
    #[must_use]
    pub fn joined_fields(&self) -> String {
        self.fields.join(&FIELD_SEPARATOR.to_string())
    }

    /// Split a stored field string back into ordered fields.
    #[must_use]
    pub fn split_fields(stored: &str) -> Vec<String> {
        stored.split(FIELD_SEPARATOR).map(str::to_string).collect()
    }

    /// First field, or empty if the note has no fields.
    #[must_use]
    pub fn first_field(&self) -> &str {
        self.fields.first().map_or("", String::as_str)
    }

    /// The `(model_id, checksum)` pair used for duplicate detection.
    #[must_use]
    pub const fn dedup_key(&self) -> (i64, u32) {
        (self.model_id, self.checksum)
    }
}
