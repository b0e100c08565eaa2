//! Data types for container contents.
//!
//! A container holds two kinds of rows: [`Note`]s (flashcard content) and
//! [`Card`]s (one reviewable instance per note). This module also carries
//! the fixed identifiers of the spelling-word note model and the entry
//! names of the container wire format.

pub mod card;
pub mod note;

pub use card::Card;
pub use note::Note;

/// Model id of the spelling-word note layout (Audio / Definition / Word).
/// Every note this engine produces uses this model.
pub const MODEL_ID: i64 = 1_607_392_319;

/// Separator between note fields in storage. Control character, never
/// allowed inside field content.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Update-sequence number marking a locally created, not-yet-synced row.
pub const USN_PENDING_SYNC: i32 = -1;

/// Archive entry holding the compressed primary database.
pub const COLLECTION_ENTRY: &str = "collection.anki21b";

/// Archive entry holding the uncompressed legacy placeholder database.
/// Present only so older readers recognize the container; never populated.
pub const LEGACY_COLLECTION_ENTRY: &str = "collection.anki2";

/// Archive entry holding the JSON media index (string key -> filename).
pub const MEDIA_ENTRY: &str = "media";

/// Derive a stable deck id from a deck name.
///
/// FNV-1a over the UTF-8 bytes, folded into the positive range the
/// container format uses for deck ids. The same name always yields the
/// same id, so re-running the pipeline targets the same deck.
#[must_use]
pub fn deck_id_for_name(name: &str) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // Positive, bounded like the original pipeline's deck ids.
    i64::try_from(hash % 10_u64.pow(10)).unwrap_or(1).max(1)
}
