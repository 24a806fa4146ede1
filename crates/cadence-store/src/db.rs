use rusqlite::Connection;

use crate::error::Result;

/// Initialise the store schema in `conn`. Safe to call on every startup
/// (idempotent).
///
/// `repeat_registry` is the score-ordered set of active repeat
/// definitions; the score index keeps range queries efficient even with
/// thousands of definitions. `jobs` holds enqueued instances; repeat
/// occurrences are keyed by their deterministic identifier so re-creation
/// overwrites instead of duplicating.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS repeat_registry (
            registry  TEXT    NOT NULL,
            member    TEXT    NOT NULL,   -- encoded repeat key
            score     INTEGER NOT NULL,   -- next-due epoch millis
            PRIMARY KEY (registry, member)
        ) STRICT;

        -- Efficient ranged enumeration: WHERE score BETWEEN ? AND ? ORDER BY score
        CREATE INDEX IF NOT EXISTS idx_registry_score
            ON repeat_registry (registry, score);

        CREATE TABLE IF NOT EXISTS jobs (
            id           TEXT    NOT NULL PRIMARY KEY,
            name         TEXT    NOT NULL,
            data         TEXT    NOT NULL,   -- opaque JSON payload
            delay_ms     INTEGER NOT NULL DEFAULT 0,
            timestamp_ms INTEGER NOT NULL,
            prev_millis  INTEGER,            -- due time fed back into the chain
            repeat_key   TEXT,               -- back-reference for removal-by-key
            repeat       TEXT,               -- JSON-encoded RepeatOptions or NULL
            state        TEXT    NOT NULL DEFAULT 'delayed'
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs (state);
        ",
    )?;
    Ok(())
}
