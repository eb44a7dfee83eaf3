use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // sender/receiver checks are deferred to commit: the user delete and
        // the message cleanup that follows it share one transaction.
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                sender_id           TEXT NOT NULL
                                    REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED,
                receiver_id         TEXT NOT NULL
                                    REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED,
                content             TEXT NOT NULL,
                timestamp           TEXT NOT NULL,
                edited              INTEGER NOT NULL DEFAULT 0,
                edited_at           TEXT,
                read                INTEGER NOT NULL DEFAULT 0,
                parent_message_id   TEXT REFERENCES messages(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_messages_receiver_read
                ON messages(receiver_id, read);
            CREATE INDEX idx_messages_pair
                ON messages(sender_id, receiver_id, timestamp);
            CREATE INDEX idx_messages_parent
                ON messages(parent_message_id, timestamp);

            CREATE TABLE message_history (
                id                  TEXT PRIMARY KEY,
                original_message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                old_content         TEXT NOT NULL,
                edited_by           TEXT REFERENCES users(id) ON DELETE SET NULL,
                edited_at           TEXT NOT NULL
            );

            CREATE INDEX idx_history_message
                ON message_history(original_message_id);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, is_read);
            CREATE INDEX idx_notifications_message
                ON notifications(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
