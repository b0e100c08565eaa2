//! Card row type: one reviewable instance of a note.

use serde::{Deserialize, Serialize};

use crate::model::USN_PENDING_SYNC;

/// One card row as stored in the `cards` table.
///
/// Scheduling fields are opaque to this engine: they are set to new-card
/// defaults on creation and preserved byte-for-byte for any card that
/// already existed before a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    /// Owning note. A note exclusively owns its cards; merges are
    /// additive only, so ownership never changes.
    pub note_id: i64,
    pub deck_id: i64,
    /// Template index within the model. Always 0: the spelling model has
    /// a single template.
    pub ordinal: i32,
    /// Last-modified time in seconds.
    pub modified: i64,
    pub usn: i32,
    pub card_type: i32,
    pub queue: i32,
    /// For new cards: position in the deck's new-card ordering.
    pub due: i64,
    pub interval: i64,
    pub ease_factor: i64,
    pub reps: i64,
    pub lapses: i64,
    pub left: i64,
    pub original_due: i64,
    pub original_deck_id: i64,
    pub flags: i32,
    pub data: String,
}

impl Card {
    /// Build a card with new-card scheduling defaults.
    ///
    /// `due` is the next sequential position in the target deck's
    /// new-card ordering; all review-history fields start zeroed.
    #[must_use]
    pub fn new(id: i64, note_id: i64, deck_id: i64, due: i64, modified: i64) -> Self {
        Self {
            id,
            note_id,
            deck_id,
            ordinal: 0,
            modified,
            usn: USN_PENDING_SYNC,
            card_type: 0,
            queue: 0,
            due,
            interval: 0,
            ease_factor: 0,
            reps: 0,
            lapses: 0,
            left: 0,
            original_due: 0,
            original_deck_id: 0,
            flags: 0,
            data: String::new(),
        }
    }
}
