//! Merge engine: reconcile a batch of new flashcards against an
//! existing container's contents.
//!
//! Pre-existing notes, cards, and media pass through unmodified — every
//! scheduling field on an existing card stays byte-identical. New
//! candidates are deduplicated on `(model_id, checksum)` and reported
//! per item: one bad candidate never fails the batch.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::factory::{NoteFactory, WordEntry};
use crate::media::MediaIndex;
use crate::model::{Card, Note};

/// Parsed contents of an existing container; empty for a from-scratch
/// build.
#[derive(Debug, Default)]
pub struct ExistingState {
    pub notes: Vec<Note>,
    pub cards: Vec<Card>,
    pub media: MediaIndex,
}

impl ExistingState {
    /// Largest note or card id present, 0 when empty. New ids are
    /// allocated above this.
    #[must_use]
    pub fn max_id(&self) -> i64 {
        let max_note = self.notes.iter().map(|n| n.id).max().unwrap_or(0);
        let max_card = self.cards.iter().map(|c| c.id).max().unwrap_or(0);
        max_note.max(max_card)
    }

    /// First free position in the new-card ordering.
    #[must_use]
    pub fn next_due(&self) -> i64 {
        self.cards
            .iter()
            .filter(|c| c.card_type == 0)
            .map(|c| c.due)
            .max()
            .map_or(0, |due| due + 1)
    }

    /// Deck id found on existing cards, if any. An update keeps the
    /// container's deck rather than the caller's default.
    #[must_use]
    pub fn deck_id(&self) -> Option<i64> {
        self.cards.first().map(|c| c.deck_id)
    }
}

/// Per-batch outcome counts and item lists.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    /// Words whose notes were added to the container.
    pub accepted: Vec<String>,
    /// Words already present (matched on checksum), discarded.
    pub skipped_duplicates: Vec<String>,
    /// Words rejected with the per-item failure that caused it.
    pub rejected: Vec<RejectedEntry>,
}

/// One rejected candidate and why.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntry {
    pub word: String,
    pub code: String,
    pub reason: String,
}

impl BatchReport {
    /// Total candidates processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.accepted.len() + self.skipped_duplicates.len() + self.rejected.len()
    }

    /// True when nothing new was accepted.
    #[must_use]
    pub fn is_all_skipped(&self) -> bool {
        self.accepted.is_empty()
    }

    fn reject(&mut self, word: &str, err: &Error) {
        warn!(%word, %err, "rejected candidate");
        self.rejected.push(RejectedEntry {
            word: word.to_string(),
            code: err.error_code().as_str().to_string(),
            reason: err.to_string(),
        });
    }
}

/// The reconciled union of existing and accepted-new rows, ready for
/// serialization.
#[derive(Debug)]
pub struct MergeOutcome {
    pub notes: Vec<Note>,
    pub cards: Vec<Card>,
    pub media: MediaIndex,
    pub report: BatchReport,
}

/// A built (note, card, media) triple awaiting reconciliation.
#[derive(Debug)]
struct Candidate {
    word: String,
    note: Note,
    card: Card,
    media_filename: String,
    media_bytes: Vec<u8>,
}

/// Merge a batch of word entries into an existing (possibly empty)
/// container state.
///
/// `default_deck_id` is used only when the existing container carries no
/// cards to infer a deck from.
///
/// # Errors
///
/// Per-item failures are collected into the report, never returned.
/// Returns an error only for whole-batch failures: a guid collision
/// (broken random source) or a database-level fault.
pub fn merge(
    existing: ExistingState,
    batch: &[WordEntry],
    default_deck_id: i64,
) -> Result<MergeOutcome> {
    let deck_id = existing.deck_id().unwrap_or(default_deck_id);
    let mut factory = NoteFactory::new(deck_id, existing.next_due(), existing.max_id());

    let mut report = BatchReport::default();
    let mut candidates = Vec::with_capacity(batch.len());
    for entry in batch {
        match factory.build(entry) {
            Ok((note, card)) => candidates.push(Candidate {
                word: entry.word.clone(),
                note,
                card,
                media_filename: entry.media_filename.trim().to_string(),
                media_bytes: entry.media_bytes.clone(),
            }),
            Err(err) if !err.is_fatal() => report.reject(&entry.word, &err),
            Err(err) => return Err(err),
        }
    }

    reconcile(existing, candidates, report)
}

/// Core reconciliation: dedup on `(model_id, checksum)`, defend guid
/// uniqueness, allocate media keys against the full index, and copy
/// every pre-existing row through untouched.
fn reconcile(
    existing: ExistingState,
    candidates: Vec<Candidate>,
    mut report: BatchReport,
) -> Result<MergeOutcome> {
    let mut seen_checksums: HashSet<(i64, u32)> =
        existing.notes.iter().map(Note::dedup_key).collect();
    let mut seen_guids: HashSet<String> =
        existing.notes.iter().map(|note| note.guid.clone()).collect();

    let mut notes = existing.notes;
    let mut cards = existing.cards;
    let mut media = existing.media;

    for candidate in candidates {
        if seen_checksums.contains(&candidate.note.dedup_key()) {
            debug!(word = %candidate.word, checksum = candidate.note.checksum, "skipped duplicate");
            report.skipped_duplicates.push(candidate.word);
            continue;
        }

        if seen_guids.contains(&candidate.note.guid) {
            // The uniqueness guarantee cannot be trusted; abort the batch.
            return Err(Error::DuplicateGuid {
                guid: candidate.note.guid,
            });
        }

        // Key allocation counts the existing container's entries, not
        // just this batch's, so updates never collide.
        let key = media.next_key();
        match media.register(key, &candidate.media_filename, candidate.media_bytes) {
            Ok(()) => {}
            Err(err) if !err.is_fatal() => {
                report.reject(&candidate.word, &err);
                continue;
            }
            Err(err) => return Err(err),
        }

        seen_checksums.insert(candidate.note.dedup_key());
        seen_guids.insert(candidate.note.guid.clone());
        report.accepted.push(candidate.word);
        notes.push(candidate.note);
        cards.push(candidate.card);
    }

    debug!(
        accepted = report.accepted.len(),
        skipped = report.skipped_duplicates.len(),
        rejected = report.rejected.len(),
        "merge complete"
    );

    Ok(MergeOutcome {
        notes,
        cards,
        media,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::field_checksum;
    use crate::model::{MODEL_ID, USN_PENDING_SYNC};

    fn entry(word: &str, filename: &str) -> WordEntry {
        WordEntry::new(word, format!("a {word}"), filename, vec![1, 2, 3])
    }

    fn existing_with(words: &[(&str, &str)]) -> ExistingState {
        // Build an existing state by running a merge from scratch.
        let batch: Vec<WordEntry> = words.iter().map(|(w, f)| entry(w, f)).collect();
        let outcome = merge(ExistingState::default(), &batch, 1).unwrap();
        ExistingState {
            notes: outcome.notes,
            cards: outcome.cards,
            media: outcome.media,
        }
    }

    #[test]
    fn test_merge_into_empty() {
        let outcome = merge(ExistingState::default(), &[entry("cat", "cat.mp3")], 1).unwrap();
        assert_eq!(outcome.report.accepted, vec!["cat"]);
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.cards.len(), 1);
        assert_eq!(outcome.media.len(), 1);
        assert_eq!(
            outcome.notes[0].checksum,
            field_checksum("[sound:cat.mp3]")
        );
    }

    #[test]
    fn test_duplicate_is_skipped_not_errored() {
        let existing = existing_with(&[("cat", "cat.mp3")]);
        let batch = vec![entry("cat", "cat.mp3"), entry("dog", "dog.mp3")];
        let outcome = merge(existing, &batch, 1).unwrap();

        assert_eq!(outcome.report.skipped_duplicates, vec!["cat"]);
        assert_eq!(outcome.report.accepted, vec!["dog"]);
        assert_eq!(outcome.notes.len(), 2);
        assert_eq!(outcome.media.len(), 2);
    }

    #[test]
    fn test_duplicate_within_one_batch() {
        let batch = vec![entry("cat", "cat.mp3"), entry("cat", "cat.mp3")];
        let outcome = merge(ExistingState::default(), &batch, 1).unwrap();
        assert_eq!(outcome.report.accepted, vec!["cat"]);
        assert_eq!(outcome.report.skipped_duplicates, vec!["cat"]);
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn test_existing_scheduling_state_untouched() {
        let mut existing = existing_with(&[("cat", "cat.mp3")]);
        // Simulate review history on the pre-existing card.
        existing.cards[0].card_type = 2;
        existing.cards[0].queue = 2;
        existing.cards[0].due = 12345;
        existing.cards[0].interval = 21;
        existing.cards[0].ease_factor = 2500;
        existing.cards[0].reps = 9;
        existing.cards[0].lapses = 1;
        let reviewed = existing.cards[0].clone();

        let outcome = merge(existing, &[entry("dog", "dog.mp3")], 1).unwrap();
        assert_eq!(outcome.cards[0], reviewed);
    }

    #[test]
    fn test_media_keys_never_collide_on_update() {
        let existing = existing_with(&[("cat", "cat.mp3")]);
        let outcome = merge(existing, &[entry("dog", "dog.mp3")], 1).unwrap();

        let keys: Vec<u32> = outcome.media.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 1]);
    }

    #[test]
    fn test_validation_failure_is_partial() {
        let batch = vec![entry("", "bad.mp3"), entry("dog", "dog.mp3")];
        let outcome = merge(ExistingState::default(), &batch, 1).unwrap();

        assert_eq!(outcome.report.accepted, vec!["dog"]);
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(outcome.report.rejected[0].code, "VALIDATION");
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn test_duplicate_filename_rejected_but_batch_continues() {
        // Two distinct words claiming the same audio file.
        let batch = vec![entry("cat", "shared.mp3"), entry("dog", "shared.mp3")];
        let outcome = merge(ExistingState::default(), &batch, 1).unwrap();

        assert_eq!(outcome.report.accepted, vec!["cat"]);
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(outcome.report.rejected[0].code, "DUPLICATE_FILENAME");
        assert_eq!(outcome.media.len(), 1);
    }

    #[test]
    fn test_guid_collision_aborts_batch() {
        let existing = existing_with(&[("cat", "cat.mp3")]);
        let stolen_guid = existing.notes[0].guid.clone();

        // Hand reconcile a candidate whose content is new but whose guid
        // repeats an existing one.
        let mut factory = NoteFactory::new(1, existing.next_due(), existing.max_id());
        let (mut note, card) = factory.build(&entry("dog", "dog.mp3")).unwrap();
        note.guid = stolen_guid;

        let err = reconcile(
            existing,
            vec![Candidate {
                word: "dog".into(),
                note,
                card,
                media_filename: "dog.mp3".into(),
                media_bytes: vec![1],
            }],
            BatchReport::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::DuplicateGuid { .. }));
    }

    #[test]
    fn test_update_keeps_existing_deck_id() {
        let mut existing = existing_with(&[("cat", "cat.mp3")]);
        for card in &mut existing.cards {
            card.deck_id = 777;
        }
        let outcome = merge(existing, &[entry("dog", "dog.mp3")], 1).unwrap();
        assert!(outcome.cards.iter().all(|c| c.deck_id == 777));
    }

    #[test]
    fn test_new_note_fields_are_well_formed() {
        let outcome = merge(ExistingState::default(), &[entry("cat", "cat.mp3")], 1).unwrap();
        let note = &outcome.notes[0];
        assert_eq!(note.model_id, MODEL_ID);
        assert_eq!(note.usn, USN_PENDING_SYNC);
        assert!(note.tags.is_empty());
        assert_eq!(note.fields.len(), 3);
    }

    #[test]
    fn test_due_positions_continue_after_existing() {
        let existing = existing_with(&[("cat", "cat.mp3"), ("dog", "dog.mp3")]);
        let outcome = merge(existing, &[entry("fox", "fox.mp3")], 1).unwrap();

        let fox_card = outcome.cards.last().unwrap();
        assert_eq!(fox_card.due, 2);
    }
}
