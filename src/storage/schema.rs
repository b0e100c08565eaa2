//! Database schema for the embedded collection.
//!
//! Column names and order follow the container format's `notes` and
//! `cards` tables so any compliant reader can open the result.

use rusqlite::{Connection, Result};

/// DDL for the two tables this engine manages.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS notes (
    id              integer primary key,
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            text not null,
    csum            integer not null,
    flags           integer not null,
    data            text not null
);

CREATE TABLE IF NOT EXISTS cards (
    id              integer primary key,
    nid             integer not null,
    did             integer not null,
    ord             integer not null,
    mod             integer not null,
    usn             integer not null,
    type            integer not null,
    queue           integer not null,
    due             integer not null,
    ivl             integer not null,
    factor          integer not null,
    reps            integer not null,
    lapses          integer not null,
    left            integer not null,
    odue            integer not null,
    odid            integer not null,
    flags           integer not null,
    data            text not null
);

CREATE INDEX IF NOT EXISTS ix_notes_csum ON notes (csum);
CREATE INDEX IF NOT EXISTS ix_notes_usn ON notes (usn);
CREATE INDEX IF NOT EXISTS ix_cards_nid ON cards (nid);
CREATE INDEX IF NOT EXISTS ix_cards_usn ON cards (usn);
CREATE INDEX IF NOT EXISTS ix_cards_sched ON cards (did, queue, due);
";

/// Apply the schema to the database.
///
/// Idempotent: all statements use `IF NOT EXISTS`, so applying to an
/// already-initialized database is a no-op.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Check that a database contains the tables this engine manages.
///
/// # Errors
///
/// Returns an error if the schema query fails.
pub fn has_required_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('notes', 'cards')",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 2)
}
