//! Note/card factory: turns validated flashcard content into rows.
//!
//! Validation mirrors what the surrounding pipeline promises but does not
//! guarantee (the definition text comes from an external API): non-empty
//! word and definition, an accepted audio extension, and no stored
//! control characters in any field.

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{Card, Note, FIELD_SEPARATOR, MODEL_ID, USN_PENDING_SYNC};

/// Audio container formats the pipeline is allowed to hand us.
static ACCEPTED_AUDIO_EXTENSIONS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["mp3", "ogg", "wav"].into_iter().collect());

/// Length of a note guid.
const GUID_LEN: usize = 10;

/// One validated flashcard tuple from the upstream pipeline.
#[derive(Debug, Clone)]
pub struct WordEntry {
    pub word: String,
    pub definition: String,
    pub media_filename: String,
    pub media_bytes: Vec<u8>,
}

impl WordEntry {
    #[must_use]
    pub fn new(
        word: impl Into<String>,
        definition: impl Into<String>,
        media_filename: impl Into<String>,
        media_bytes: Vec<u8>,
    ) -> Self {
        Self {
            word: word.into(),
            definition: definition.into(),
            media_filename: media_filename.into(),
            media_bytes,
        }
    }
}

/// 32-bit digest of a note's first field, the dedup key component.
///
/// First four bytes of the SHA-256 of the field, big-endian, matching the
/// checksum width of the container format.
#[must_use]
pub fn field_checksum(first_field: &str) -> u32 {
    let digest = Sha256::digest(first_field.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Draw a fixed-length random alphanumeric guid.
///
/// Collision probability over a batch is negligible; the merge engine
/// still rejects duplicates defensively.
#[must_use]
pub fn generate_guid() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), GUID_LEN)
}

/// Allocates millisecond ids that never repeat within a process.
///
/// Ids double as creation-timestamp proxies, so they track wall-clock
/// time but step forward by one when two allocations land in the same
/// millisecond.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    /// Start allocating above everything already present in a container.
    #[must_use]
    pub const fn starting_after(max_existing: i64) -> Self {
        Self { last: max_existing }
    }

    /// Next unique id: current time in milliseconds, bumped past the
    /// previous allocation if needed.
    pub fn next(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// Builds note + card row pairs with fresh identifiers and new-card
/// scheduling defaults.
#[derive(Debug)]
pub struct NoteFactory {
    deck_id: i64,
    note_ids: IdAllocator,
    card_ids: IdAllocator,
    next_due: i64,
}

impl NoteFactory {
    /// `next_due` is the first free position in the target deck's
    /// new-card ordering; `max_existing_id` is the largest note or card
    /// id already present in the container being updated.
    #[must_use]
    pub const fn new(deck_id: i64, next_due: i64, max_existing_id: i64) -> Self {
        Self {
            deck_id,
            note_ids: IdAllocator::starting_after(max_existing_id),
            card_ids: IdAllocator::starting_after(max_existing_id),
            next_due,
        }
    }

    /// Build a note and its single card from a validated word entry.
    ///
    /// Field order is fixed: `[sound:{file}]`, `Definition: {definition}`,
    /// lowercased word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the offending field if the
    /// entry is malformed. Never fails for any other reason.
    pub fn build(&mut self, entry: &WordEntry) -> Result<(Note, Card)> {
        validate(entry)?;

        let fields = vec![
            format!("[sound:{}]", entry.media_filename.trim()),
            format!("Definition: {}", entry.definition.trim()),
            entry.word.trim().to_lowercase(),
        ];
        let sort_field = fields[0].clone();
        let checksum = field_checksum(&fields[0]);

        let note_id = self.note_ids.next();
        let modified = note_id / 1000;
        let note = Note {
            id: note_id,
            guid: generate_guid(),
            model_id: MODEL_ID,
            modified,
            usn: USN_PENDING_SYNC,
            tags: String::new(),
            fields,
            sort_field,
            checksum,
            flags: 0,
            data: String::new(),
        };

        let card = Card::new(self.card_ids.next(), note.id, self.deck_id, self.next_due, modified);
        self.next_due += 1;

        Ok((note, card))
    }
}

fn validate(entry: &WordEntry) -> Result<()> {
    if entry.word.trim().is_empty() {
        return Err(Error::Validation {
            field: "word",
            reason: "cannot be empty".to_string(),
        });
    }
    if entry.definition.trim().is_empty() {
        return Err(Error::Validation {
            field: "definition",
            reason: "cannot be empty".to_string(),
        });
    }

    let filename = entry.media_filename.trim();
    if filename.is_empty() {
        return Err(Error::Validation {
            field: "media_filename",
            reason: "cannot be empty".to_string(),
        });
    }
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    if !extension.is_some_and(|ext| ACCEPTED_AUDIO_EXTENSIONS.contains(ext.as_str())) {
        return Err(Error::Validation {
            field: "media_filename",
            reason: format!("'{filename}' must end in .mp3, .ogg, or .wav"),
        });
    }

    if entry.media_bytes.is_empty() {
        return Err(Error::Validation {
            field: "media_bytes",
            reason: "cannot be empty".to_string(),
        });
    }

    // The separator is a storage control character; content containing it
    // would split into extra fields on read.
    for (field, value) in [
        ("word", &entry.word),
        ("definition", &entry.definition),
        ("media_filename", &entry.media_filename),
    ] {
        if value.contains(FIELD_SEPARATOR) {
            return Err(Error::Validation {
                field,
                reason: "contains the reserved field separator".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat() -> WordEntry {
        WordEntry::new("cat", "a small domesticated animal", "cat.mp3", vec![1, 2, 3])
    }

    #[test]
    fn test_build_assembles_fields_in_order() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let (note, card) = factory.build(&cat()).unwrap();

        assert_eq!(
            note.fields,
            vec![
                "[sound:cat.mp3]".to_string(),
                "Definition: a small domesticated animal".to_string(),
                "cat".to_string(),
            ]
        );
        assert_eq!(note.sort_field, "[sound:cat.mp3]");
        assert_eq!(note.model_id, MODEL_ID);
        assert_eq!(note.checksum, field_checksum("[sound:cat.mp3]"));
        assert_eq!(card.note_id, note.id);
        assert_eq!(card.due, 0);
    }

    #[test]
    fn test_word_is_lowercased() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("  CaT  ", "a small domesticated animal", "cat.mp3", vec![1]);
        let (note, _) = factory.build(&entry).unwrap();
        assert_eq!(note.fields[2], "cat");
    }

    #[test]
    fn test_ids_strictly_increase_within_batch() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let mut previous = 0;
        for _ in 0..100 {
            let (note, _) = factory.build(&cat()).unwrap();
            assert!(note.id > previous, "ids must never repeat in one batch");
            previous = note.id;
        }
    }

    #[test]
    fn test_due_positions_are_sequential() {
        let mut factory = NoteFactory::new(1, 5, 0);
        let (_, first) = factory.build(&cat()).unwrap();
        let (_, second) = factory.build(&cat()).unwrap();
        assert_eq!(first.due, 5);
        assert_eq!(second.due, 6);
    }

    #[test]
    fn test_guid_shape() {
        let guid = generate_guid();
        assert_eq!(guid.len(), GUID_LEN);
        assert!(guid.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_checksum_is_stable_and_discriminating() {
        assert_eq!(
            field_checksum("[sound:cat.mp3]"),
            field_checksum("[sound:cat.mp3]")
        );
        assert_ne!(
            field_checksum("[sound:cat.mp3]"),
            field_checksum("[sound:dog.mp3]")
        );
    }

    #[test]
    fn test_rejects_empty_word() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("   ", "def", "cat.mp3", vec![1]);
        let err = factory.build(&entry).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "word", .. }));
    }

    #[test]
    fn test_rejects_empty_definition() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("cat", "", "cat.mp3", vec![1]);
        let err = factory.build(&entry).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "definition", .. }));
    }

    #[test]
    fn test_rejects_bad_audio_extension() {
        let mut factory = NoteFactory::new(1, 0, 0);
        for filename in ["cat.flac", "cat", "cat.mp3.txt"] {
            let entry = WordEntry::new("cat", "def", filename, vec![1]);
            let err = factory.build(&entry).unwrap_err();
            assert!(
                matches!(err, Error::Validation { field: "media_filename", .. }),
                "{filename} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_uppercase_extension() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("cat", "def", "CAT.MP3", vec![1]);
        assert!(factory.build(&entry).is_ok());
    }

    #[test]
    fn test_rejects_empty_media_bytes() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("cat", "def", "cat.mp3", vec![]);
        let err = factory.build(&entry).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "media_bytes", .. }));
    }

    #[test]
    fn test_rejects_separator_in_content() {
        let mut factory = NoteFactory::new(1, 0, 0);
        let entry = WordEntry::new("cat", "a\u{1f}b", "cat.mp3", vec![1]);
        let err = factory.build(&entry).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "definition", .. }));
    }
}
