use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;
use uuid::Uuid;

use missive_types::api::{MessageSummary, UserRef};
use missive_types::models::{Message, MessageHistory, Notification, User};

use crate::Database;
use crate::Result;
use crate::models::{MessageWithSender, ThreadReply, UnreadOrder};

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, m.receiver_id, m.content, m.timestamp, \
     m.edited, m.edited_at, m.read, m.parent_message_id";

impl Database {
    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| get_user(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_by_username(conn, username))
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| get_message(conn, id))
    }

    pub fn history_for_message(&self, message_id: Uuid) -> Result<Vec<MessageHistory>> {
        self.with_conn(|conn| history_for_message(conn, message_id))
    }

    pub fn notifications_for_user(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        self.with_conn(|conn| notifications_for_user(conn, user_id, unread_only))
    }
}

// -- Users --

pub fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
        params![user.id.to_string(), user.username, fmt_ts(&user.created_at)],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            [id.to_string()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, created_at FROM users WHERE username = ?1",
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Returns the number of rows removed (0 or 1).
pub fn delete_user(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?)
}

// -- Messages --

pub fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages
            (id, sender_id, receiver_id, content, timestamp, edited, edited_at, read, parent_message_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.to_string(),
            message.content,
            fmt_ts(&message.timestamp),
            message.edited,
            message.edited_at.as_ref().map(fmt_ts),
            message.read,
            message.parent_message_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1");
    let message = conn
        .query_row(&sql, [id.to_string()], message_from_row)
        .optional()?;
    Ok(message)
}

/// Writes the mutable fields of a message. Identity, participants, parent
/// and creation timestamp are never rewritten.
pub fn update_message(conn: &Connection, message: &Message) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE messages SET content = ?2, edited = ?3, edited_at = ?4, read = ?5 WHERE id = ?1",
        params![
            message.id.to_string(),
            message.content,
            message.edited,
            message.edited_at.as_ref().map(fmt_ts),
            message.read,
        ],
    )?;
    Ok(changed)
}

pub fn delete_message(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?)
}

/// Single set-based delete of every message the user sent or received.
pub fn delete_messages_involving(conn: &Connection, user_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM messages WHERE sender_id = ?1 OR receiver_id = ?1",
        [user_id.to_string()],
    )?)
}

/// Every message exchanged between two users, in either direction, with
/// the sender joined in. Oldest first.
pub fn messages_between(conn: &Connection, user1: Uuid, user2: Uuid) -> Result<Vec<MessageWithSender>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}, s.username
         FROM messages m
         JOIN users s ON s.id = m.sender_id
         WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
            OR (m.sender_id = ?2 AND m.receiver_id = ?1)
         ORDER BY m.timestamp ASC, m.rowid ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user1.to_string(), user2.to_string()], message_with_sender_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every reply hanging off a top-level message between the pair, down to
/// `max_level` levels, in one statement. The pair is bound once, so the
/// statement size does not grow with the conversation.
pub fn conversation_replies(
    conn: &Connection,
    user1: Uuid,
    user2: Uuid,
    max_level: u32,
) -> Result<Vec<ThreadReply>> {
    let sql = format!(
        "WITH RECURSIVE tree(id, level) AS (
             SELECT r.id, 1
             FROM messages r
             JOIN messages p ON p.id = r.parent_message_id
             WHERE p.parent_message_id IS NULL
               AND ((p.sender_id = ?1 AND p.receiver_id = ?2)
                 OR (p.sender_id = ?2 AND p.receiver_id = ?1))
             UNION ALL
             SELECT c.id, tree.level + 1
             FROM messages c
             JOIN tree ON c.parent_message_id = tree.id
             WHERE tree.level < ?3
         )
         SELECT {MESSAGE_COLUMNS}, s.username, tree.level
         FROM tree
         JOIN messages m ON m.id = tree.id
         JOIN users s ON s.id = m.sender_id
         ORDER BY m.timestamp ASC, m.rowid ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user1.to_string(), user2.to_string(), max_level], |row| {
            Ok(ThreadReply {
                row: message_with_sender_from_row(row)?,
                level: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Unread messages addressed to `receiver_id`, projected to summary columns.
pub fn unread_summaries(conn: &Connection, receiver_id: Uuid, order: UnreadOrder) -> Result<Vec<MessageSummary>> {
    let sql = format!(
        "SELECT m.id, m.content, m.timestamp, m.sender_id, s.username
         FROM messages m
         JOIN users s ON s.id = m.sender_id
         WHERE m.read = 0 AND m.receiver_id = ?1{}",
        order.order_clause()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([receiver_id.to_string()], |row| {
            Ok(MessageSummary {
                id: uuid_at(row, 0)?,
                content: row.get(1)?,
                timestamp: ts_at(row, 2)?,
                sender: UserRef {
                    id: uuid_at(row, 3)?,
                    username: row.get(4)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_unread(conn: &Connection, receiver_id: Uuid) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE read = 0 AND receiver_id = ?1",
        [receiver_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}

// -- History --

pub fn insert_history(conn: &Connection, entry: &MessageHistory) -> Result<()> {
    conn.execute(
        "INSERT INTO message_history (id, original_message_id, old_content, edited_by, edited_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id.to_string(),
            entry.original_message_id.to_string(),
            entry.old_content,
            entry.edited_by.map(|id| id.to_string()),
            fmt_ts(&entry.edited_at),
        ],
    )?;
    Ok(())
}

/// Edit snapshots for one message, oldest first.
pub fn history_for_message(conn: &Connection, message_id: Uuid) -> Result<Vec<MessageHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, original_message_id, old_content, edited_by, edited_at
         FROM message_history
         WHERE original_message_id = ?1
         ORDER BY edited_at ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map([message_id.to_string()], |row| {
            Ok(MessageHistory {
                id: uuid_at(row, 0)?,
                original_message_id: uuid_at(row, 1)?,
                old_content: row.get(2)?,
                edited_by: opt_uuid_at(row, 3)?,
                edited_at: ts_at(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Notifications --

pub fn insert_notification(conn: &Connection, notification: &Notification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, message_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            notification.id.to_string(),
            notification.user_id.to_string(),
            notification.message_id.to_string(),
            notification.is_read,
            fmt_ts(&notification.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn notifications_for_user(conn: &Connection, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
    let sql = if unread_only {
        "SELECT id, user_id, message_id, is_read, created_at FROM notifications
         WHERE user_id = ?1 AND is_read = 0
         ORDER BY created_at DESC, rowid DESC"
    } else {
        "SELECT id, user_id, message_id, is_read, created_at FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| {
            Ok(Notification {
                id: uuid_at(row, 0)?,
                user_id: uuid_at(row, 1)?,
                message_id: uuid_at(row, 2)?,
                is_read: row.get(3)?,
                created_at: ts_at(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_notification_read(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        [id.to_string()],
    )?)
}

// -- Row decoding --

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        created_at: ts_at(row, 2)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: uuid_at(row, 2)?,
        content: row.get(3)?,
        timestamp: ts_at(row, 4)?,
        edited: row.get(5)?,
        edited_at: opt_ts_at(row, 6)?,
        read: row.get(7)?,
        parent_message_id: opt_uuid_at(row, 8)?,
    })
}

fn message_with_sender_from_row(row: &Row<'_>) -> rusqlite::Result<MessageWithSender> {
    Ok(MessageWithSender {
        message: message_from_row(row)?,
        sender_username: row.get(9)?,
    })
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        warn!("Corrupt uuid '{}' in column {}: {}", raw, idx, e);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => uuid_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            warn!("Corrupt timestamp '{}' in column {}: {}", raw, idx, e);
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => ts_at(row, idx).map(Some),
        None => Ok(None),
    }
}
