//! Typed read/write operations over the embedded collection database.
//!
//! The database lives in memory while the engine works on it; byte
//! serialization round-trips through a temp file using SQLite's online
//! backup API.

use std::fs;
use std::time::Duration;

use rusqlite::{backup::Backup, params, Connection};

use crate::error::{Error, Result};
use crate::model::{Card, Note};
use crate::storage::schema::{apply_schema, has_required_tables};

/// Pages copied per backup step. The collections this engine produces
/// are small; one step usually finishes the copy.
const BACKUP_PAGES_PER_STEP: std::os::raw::c_int = 512;

/// Handle over an in-memory collection database.
#[derive(Debug)]
pub struct CollectionDb {
    conn: Connection,
}

impl CollectionDb {
    /// Create an empty collection with exactly the notes and cards tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_or_create_empty() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Restore a collection from serialized database bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid database or the
    /// notes/cards tables are absent. Callers updating a container wrap
    /// this into `CorruptArchive` with the container path.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let staging = tempfile::NamedTempFile::new()?;
        fs::write(staging.path(), bytes)?;

        let source = Connection::open(staging.path())?;
        let mut conn = Connection::open_in_memory()?;
        {
            let backup = Backup::new(&source, &mut conn)?;
            backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
        }

        if !has_required_tables(&conn)? {
            return Err(Error::Other(
                "embedded database is missing the notes/cards tables".to_string(),
            ));
        }
        Ok(Self { conn })
    }

    /// All notes, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data
             FROM notes ORDER BY id",
        )?;
        let notes = stmt
            .query_map([], |row| {
                let csum: i64 = row.get(8)?;
                Ok(Note {
                    id: row.get(0)?,
                    guid: row.get(1)?,
                    model_id: row.get(2)?,
                    modified: row.get(3)?,
                    usn: row.get(4)?,
                    tags: row.get(5)?,
                    fields: Note::split_fields(&row.get::<_, String>(6)?),
                    sort_field: row.get(7)?,
                    checksum: u32::try_from(csum)
                        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(8, csum))?,
                    flags: row.get(9)?,
                    data: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// All cards, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_cards(&self) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                    reps, lapses, left, odue, odid, flags, data
             FROM cards ORDER BY id",
        )?;
        let cards = stmt
            .query_map([], |row| {
                Ok(Card {
                    id: row.get(0)?,
                    note_id: row.get(1)?,
                    deck_id: row.get(2)?,
                    ordinal: row.get(3)?,
                    modified: row.get(4)?,
                    usn: row.get(5)?,
                    card_type: row.get(6)?,
                    queue: row.get(7)?,
                    due: row.get(8)?,
                    interval: row.get(9)?,
                    ease_factor: row.get(10)?,
                    reps: row.get(11)?,
                    lapses: row.get(12)?,
                    left: row.get(13)?,
                    original_due: row.get(14)?,
                    original_deck_id: row.get(15)?,
                    flags: row.get(16)?,
                    data: row.get(17)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Insert one note row. Parameter binding only: field content may
    /// contain quotes or control characters from an external API.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. duplicate id).
    pub fn insert_note(&self, note: &Note) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                note.id,
                note.guid,
                note.model_id,
                note.modified,
                note.usn,
                note.tags,
                note.joined_fields(),
                note.sort_field,
                i64::from(note.checksum),
                note.flags,
                note.data,
            ],
        )?;
        Ok(())
    }

    /// Insert one card row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_card(&self, card: &Card) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl,
                                factor, reps, lapses, left, odue, odid, flags, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                card.id,
                card.note_id,
                card.deck_id,
                card.ordinal,
                card.modified,
                card.usn,
                card.card_type,
                card.queue,
                card.due,
                card.interval,
                card.ease_factor,
                card.reps,
                card.lapses,
                card.left,
                card.original_due,
                card.original_deck_id,
                card.flags,
                card.data,
            ],
        )?;
        Ok(())
    }

    /// Serialize the collection to database bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or file read fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let staging = tempfile::NamedTempFile::new()?;
        {
            let mut target = Connection::open(staging.path())?;
            let backup = Backup::new(&self.conn, &mut target)?;
            backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
        }
        Ok(fs::read(staging.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MODEL_ID, USN_PENDING_SYNC};

    fn sample_note(id: i64, checksum: u32) -> Note {
        Note {
            id,
            guid: format!("guid{id}"),
            model_id: MODEL_ID,
            modified: id / 1000,
            usn: USN_PENDING_SYNC,
            tags: String::new(),
            fields: vec![
                "[sound:cat.mp3]".into(),
                "Definition: a small domesticated animal".into(),
                "cat".into(),
            ],
            sort_field: "[sound:cat.mp3]".into(),
            checksum,
            flags: 0,
            data: String::new(),
        }
    }

    #[test]
    fn test_empty_collection_has_no_rows() {
        let db = CollectionDb::open_or_create_empty().unwrap();
        assert!(db.list_notes().unwrap().is_empty());
        assert!(db.list_cards().unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_list_round_trip() {
        let db = CollectionDb::open_or_create_empty().unwrap();
        let note = sample_note(1_700_000_000_000, 0xDEAD_BEEF);
        let card = Card::new(1_700_000_000_001, note.id, 1, 0, 1_700_000_000);

        db.insert_note(&note).unwrap();
        db.insert_card(&card).unwrap();

        assert_eq!(db.list_notes().unwrap(), vec![note]);
        assert_eq!(db.list_cards().unwrap(), vec![card]);
    }

    #[test]
    fn test_serialize_load_round_trip() {
        let db = CollectionDb::open_or_create_empty().unwrap();
        let note = sample_note(42, 7);
        db.insert_note(&note).unwrap();
        db.insert_card(&Card::new(43, 42, 1, 0, 0)).unwrap();

        let bytes = db.serialize().unwrap();
        let restored = CollectionDb::load_from_bytes(&bytes).unwrap();

        assert_eq!(restored.list_notes().unwrap(), vec![note]);
        assert_eq!(restored.list_cards().unwrap().len(), 1);
    }

    #[test]
    fn test_load_rejects_garbage_bytes() {
        assert!(CollectionDb::load_from_bytes(b"not a database").is_err());
    }

    #[test]
    fn test_load_rejects_database_without_tables() {
        // A valid database, but with the wrong schema.
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE unrelated (x integer)")
            .unwrap();
        let staging = tempfile::NamedTempFile::new().unwrap();
        {
            let mut target = Connection::open(staging.path()).unwrap();
            let backup = Backup::new(&conn, &mut target).unwrap();
            backup
                .run_to_completion(512, Duration::ZERO, None)
                .unwrap();
        }
        let bytes = fs::read(staging.path()).unwrap();

        assert!(CollectionDb::load_from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_adversarial_field_content_survives() {
        let db = CollectionDb::open_or_create_empty().unwrap();
        let mut note = sample_note(1, 2);
        note.fields = vec![
            "[sound:x.mp3]".into(),
            "Definition: '; DROP TABLE notes; --".into(),
            "word\"with'quotes".into(),
        ];
        db.insert_note(&note).unwrap();

        let listed = db.list_notes().unwrap();
        assert_eq!(listed[0].fields, note.fields);
    }
}
