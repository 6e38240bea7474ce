use rusqlite::Connection;
use tracing::info;

use crate::StorageError;

pub fn run(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            domain      TEXT NOT NULL,
            is_admin    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id   INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            visibility  TEXT NOT NULL,
            domain      TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_visibility
            ON messages(visibility, created_at);
        ",
    )
    .map_err(|e| StorageError::Backend(e.to_string()))?;

    info!("database migrations complete");
    Ok(())
}
