use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};
use uuid::Uuid;

use missive_db::models::MessageWithSender;
use missive_db::{Database, queries};
use missive_types::api::{ThreadedMessage, UserRef};

use crate::{Result, StoreError};

/// How many levels of replies to attach below each top-level message.
/// Capped at `MAX`, which bounds the nesting of the returned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadDepth(u32);

impl ThreadDepth {
    pub const DIRECT_REPLIES: Self = Self(1);
    pub const MAX: Self = Self(64);

    /// Clamped to `1..=MAX`.
    pub fn new(levels: u32) -> Self {
        Self(levels.clamp(Self::DIRECT_REPLIES.0, Self::MAX.0))
    }

    pub fn levels(self) -> u32 {
        self.0
    }
}

impl Default for ThreadDepth {
    fn default() -> Self {
        Self::DIRECT_REPLIES
    }
}

impl fmt::Display for ThreadDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ThreadDepth {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self::new)
    }
}

/// The conversation between `user1` and `user2` as a forest of top-level
/// messages, oldest first, each carrying its replies down to `depth` levels.
///
/// Only a participant may ask. One query fetches the conversation and one
/// fetches every reply level, so the cost is two round trips however long
/// the conversation is and whatever the depth.
pub fn threaded_conversation(
    db: &Database,
    user1: Uuid,
    user2: Uuid,
    requester: Uuid,
    depth: ThreadDepth,
) -> Result<Vec<ThreadedMessage>> {
    if requester != user1 && requester != user2 {
        warn!(%requester, %user1, %user2, "Rejected conversation request from non-participant");
        return Err(StoreError::Forbidden);
    }

    let roots: Vec<MessageWithSender> = db
        .with_conn(|conn| queries::messages_between(conn, user1, user2))?
        .into_iter()
        .filter(|m| m.message.is_top_level())
        .collect();
    if roots.is_empty() {
        return Ok(vec![]);
    }

    let mut replies = db.with_conn(|conn| queries::conversation_replies(conn, user1, user2, depth.levels()))?;

    // Deepest level first, so every node is complete before it is moved
    // into its parent. The sort is stable and keeps timestamp order within
    // a level, which keeps each parent's replies in timestamp order.
    replies.sort_by(|a, b| b.level.cmp(&a.level));

    let mut children: HashMap<Uuid, Vec<ThreadedMessage>> = HashMap::new();
    for reply in replies {
        let parent_id = reply.row.message.parent_message_id;
        let node = to_threaded(reply.row, &mut children);
        if let Some(parent_id) = parent_id {
            children.entry(parent_id).or_default().push(node);
        }
    }

    let threads: Vec<ThreadedMessage> = roots
        .into_iter()
        .map(|root| to_threaded(root, &mut children))
        .collect();

    debug!(%user1, %user2, threads = threads.len(), "Assembled conversation");
    Ok(threads)
}

fn to_threaded(row: MessageWithSender, children: &mut HashMap<Uuid, Vec<ThreadedMessage>>) -> ThreadedMessage {
    ThreadedMessage {
        id: row.message.id,
        sender: UserRef {
            id: row.message.sender_id,
            username: row.sender_username,
        },
        content: row.message.content,
        timestamp: row.message.timestamp,
        edited: row.message.edited,
        replies: children.remove(&row.message.id).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use missive_types::models::NewMessage;

    use super::*;
    use crate::Store;

    #[test]
    fn depth_parses_and_clamps() {
        assert_eq!("3".parse::<ThreadDepth>().unwrap().levels(), 3);
        assert_eq!("0".parse::<ThreadDepth>().unwrap(), ThreadDepth::DIRECT_REPLIES);
        assert_eq!("100000".parse::<ThreadDepth>().unwrap(), ThreadDepth::MAX);
        assert!("deep".parse::<ThreadDepth>().is_err());
    }

    #[test]
    fn non_participant_is_forbidden_without_querying() {
        let store = Store::with_standard_hooks(Database::open_in_memory().unwrap());
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        let carol = store.create_user("carol").unwrap();
        store.send_message(NewMessage::new(alice.id, bob.id, "private")).unwrap();

        let before = store.db().round_trips();
        let err = threaded_conversation(store.db(), alice.id, bob.id, carol.id, ThreadDepth::default())
            .unwrap_err();

        assert!(matches!(err, StoreError::Forbidden));
        assert_eq!(store.db().round_trips(), before);
    }

    #[test]
    fn deeper_levels_follow_replies_outside_the_pair() {
        let store = Store::with_standard_hooks(Database::open_in_memory().unwrap());
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        let carol = store.create_user("carol").unwrap();

        let root = store.send_message(NewMessage::new(alice.id, bob.id, "root")).unwrap();
        let aside = store
            .send_message(NewMessage::new(carol.id, alice.id, "aside").reply_to(root.id))
            .unwrap();
        let nested = store
            .send_message(NewMessage::new(alice.id, carol.id, "nested").reply_to(aside.id))
            .unwrap();

        let shallow = threaded_conversation(store.db(), alice.id, bob.id, bob.id, ThreadDepth::default())
            .unwrap();
        assert_eq!(shallow[0].reply_ids(), vec![aside.id]);
        assert!(shallow[0].replies[0].replies.is_empty());

        let deep = threaded_conversation(store.db(), alice.id, bob.id, bob.id, ThreadDepth::new(2)).unwrap();
        assert_eq!(deep[0].replies[0].reply_ids(), vec![nested.id]);
        assert_eq!(deep[0].replies[0].sender.username, "carol");
    }

    #[test]
    fn default_depth_attaches_direct_replies_only() {
        let store = Store::with_standard_hooks(Database::open_in_memory().unwrap());
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();

        let root = store.send_message(NewMessage::new(alice.id, bob.id, "root")).unwrap();
        let reply = store
            .send_message(NewMessage::new(bob.id, alice.id, "reply").reply_to(root.id))
            .unwrap();
        let nested = store
            .send_message(NewMessage::new(alice.id, bob.id, "nested").reply_to(reply.id))
            .unwrap();

        let before = store.db().round_trips();
        let threads = threaded_conversation(store.db(), alice.id, bob.id, alice.id, ThreadDepth::default())
            .unwrap();

        assert_eq!(store.db().round_trips() - before, 2);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].reply_ids(), vec![reply.id]);
        assert!(threads[0].replies[0].replies.is_empty());
        assert_eq!(threads[0].subtree_size(), 2);

        let before = store.db().round_trips();
        let threads = threaded_conversation(store.db(), alice.id, bob.id, alice.id, ThreadDepth::new(5))
            .unwrap();

        assert_eq!(store.db().round_trips() - before, 2);
        assert_eq!(threads[0].replies[0].reply_ids(), vec![nested.id]);
        assert_eq!(threads[0].subtree_size(), 3);
    }

    #[test]
    fn empty_conversation_is_empty() {
        let store = Store::with_standard_hooks(Database::open_in_memory().unwrap());
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();

        let threads = threaded_conversation(store.db(), alice.id, bob.id, alice.id, ThreadDepth::default())
            .unwrap();
        assert!(threads.is_empty());
    }
}
