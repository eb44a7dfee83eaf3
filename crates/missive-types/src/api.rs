use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Users --

/// Minimal sender identity embedded in read projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
}

// -- Unread --

/// Projection returned by the unread view. Only the columns a summary
/// list needs are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender: UserRef,
}

// -- Threads --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadedMessage {
    pub id: Uuid,
    pub sender: UserRef,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub edited: bool,
    pub replies: Vec<ThreadedMessage>,
}

impl ThreadedMessage {
    /// Number of messages in this subtree, including the root.
    pub fn subtree_size(&self) -> usize {
        let mut size = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            size += 1;
            stack.extend(&node.replies);
        }
        size
    }

    pub fn reply_ids(&self) -> Vec<Uuid> {
        self.replies.iter().map(|r| r.id).collect()
    }
}

// Unlinks replies onto a heap stack so dropping a long chain does not
// recurse once per level.
impl Drop for ThreadedMessage {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.replies);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.replies);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(content: &str, replies: Vec<ThreadedMessage>) -> ThreadedMessage {
        ThreadedMessage {
            id: Uuid::new_v4(),
            sender: UserRef {
                id: Uuid::new_v4(),
                username: "alice".into(),
            },
            content: content.into(),
            timestamp: Utc::now(),
            edited: false,
            replies,
        }
    }

    #[test]
    fn subtree_len_counts_nested_replies() {
        let thread = node("root", vec![node("a", vec![node("a.1", vec![])]), node("b", vec![])]);
        assert_eq!(thread.subtree_size(), 4);
        assert_eq!(thread.reply_ids().len(), 2);
    }

    #[test]
    fn long_chain_counts_and_drops_without_recursion() {
        let mut thread = node("leaf", vec![]);
        for _ in 0..200_000 {
            thread = node("link", vec![thread]);
        }
        assert_eq!(thread.subtree_size(), 200_001);
        drop(thread);
    }

    #[test]
    fn threaded_message_serializes_nested_replies() {
        let thread = node("root", vec![node("child", vec![])]);
        let json = serde_json::to_value(&thread).unwrap();
        assert_eq!(json["content"], "root");
        assert_eq!(json["sender"]["username"], "alice");
        assert_eq!(json["replies"][0]["content"], "child");
        assert!(json["replies"][0]["replies"].as_array().unwrap().is_empty());
    }
}
