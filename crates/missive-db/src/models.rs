//! Query-side types that don't belong in missive-types: result rows that
//! carry joined columns, and read options.

use missive_types::models::Message;

/// A message joined with its sender's username in the same statement.
#[derive(Debug, Clone)]
pub struct MessageWithSender {
    pub message: Message,
    pub sender_username: String,
}

/// A reply below a conversation's top-level message. `level` is 1 for a
/// direct reply, 2 for a reply to that reply, and so on.
#[derive(Debug, Clone)]
pub struct ThreadReply {
    pub row: MessageWithSender,
    pub level: u32,
}

/// Ordering for the unread projection. `Unspecified` issues no ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnreadOrder {
    #[default]
    Unspecified,
    OldestFirst,
    NewestFirst,
}

impl UnreadOrder {
    pub(crate) fn order_clause(self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::OldestFirst => " ORDER BY m.timestamp ASC, m.rowid ASC",
            Self::NewestFirst => " ORDER BY m.timestamp DESC, m.rowid DESC",
        }
    }
}
