use tracing::{debug, info};
use uuid::Uuid;

use missive_db::Database;
use missive_db::queries;
use missive_types::api::{MessageSummary, ThreadedMessage};
use missive_types::models::{Message, MessageHistory, NewMessage, Notification, User};

use crate::hooks::HookChain;
use crate::threads::{self, ThreadDepth};
use crate::unread::{self, UnreadOrder};
use crate::{Result, StoreError};

/// Mutation API over the database. Each write runs in one transaction
/// together with the hooks it triggers.
pub struct Store {
    db: Database,
    hooks: HookChain,
}

impl Store {
    pub fn new(db: Database, hooks: HookChain) -> Self {
        Self { db, hooks }
    }

    pub fn with_standard_hooks(db: Database) -> Self {
        Self::new(db, HookChain::standard())
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    // -- Users --

    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::Invalid("username must not be empty"));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: missive_db::now(),
        };
        self.db.with_tx(|conn| -> Result<()> {
            Ok(queries::insert_user(conn, &user)?)
        })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.db.get_user(id)?)
    }

    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.db.get_user_by_username(username)?)
    }

    /// Deletes the user and runs the post-delete hooks in the same
    /// transaction. Returns `false` if there was no such user.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let removed = self.db.with_tx(|conn| -> Result<bool> {
            if queries::delete_user(conn, id)? == 0 {
                return Ok(false);
            }
            self.hooks.post_delete_user(conn, id)?;
            Ok(true)
        })?;

        if removed {
            info!(user_id = %id, "User deleted");
        }
        Ok(removed)
    }

    // -- Messages --

    pub fn send_message(&self, new: NewMessage) -> Result<Message> {
        if new.content.trim().is_empty() {
            return Err(StoreError::Invalid("message content must not be empty"));
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content,
            timestamp: missive_db::now(),
            edited: false,
            edited_at: None,
            read: false,
            parent_message_id: new.parent_message_id,
        };

        self.db.with_tx(|conn| -> Result<()> {
            if queries::get_user(conn, message.sender_id)?.is_none() {
                return Err(StoreError::NotFound("sender"));
            }
            if queries::get_user(conn, message.receiver_id)?.is_none() {
                return Err(StoreError::NotFound("receiver"));
            }
            if let Some(parent_id) = message.parent_message_id {
                if queries::get_message(conn, parent_id)?.is_none() {
                    return Err(StoreError::NotFound("parent message"));
                }
            }

            queries::insert_message(conn, &message)?;
            self.hooks.post_create_message(conn, &message)
        })?;

        debug!(message_id = %message.id, "Message created");
        Ok(message)
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.db.get_message(id)?)
    }

    /// Persists the mutable fields of `message` after the pre-update hooks
    /// have seen (and possibly adjusted) it.
    pub fn update_message(&self, message: &mut Message) -> Result<()> {
        self.db.with_tx(|conn| -> Result<()> {
            self.hooks.pre_update_message(conn, message)?;
            if queries::update_message(conn, message)? == 0 {
                return Err(StoreError::NotFound("message"));
            }
            Ok(())
        })
    }

    pub fn edit_message(&self, id: Uuid, content: impl Into<String>) -> Result<Message> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(StoreError::Invalid("message content must not be empty"));
        }

        let mut message = self.load_message(id)?;
        message.content = content;
        self.update_message(&mut message)?;
        Ok(message)
    }

    pub fn mark_message_read(&self, id: Uuid) -> Result<Message> {
        let mut message = self.load_message(id)?;
        message.read = true;
        self.update_message(&mut message)?;
        Ok(message)
    }

    /// Replies, history and notifications of the message are removed with it.
    pub fn delete_message(&self, id: Uuid) -> Result<bool> {
        let removed = self.db.with_tx(|conn| -> Result<usize> {
            Ok(queries::delete_message(conn, id)?)
        })?;
        Ok(removed > 0)
    }

    pub fn message_history(&self, message_id: Uuid) -> Result<Vec<MessageHistory>> {
        Ok(self.db.history_for_message(message_id)?)
    }

    fn load_message(&self, id: Uuid) -> Result<Message> {
        self.db.get_message(id)?.ok_or(StoreError::NotFound("message"))
    }

    // -- Notifications --

    pub fn notifications_for_user(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        Ok(self.db.notifications_for_user(user_id, unread_only)?)
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<()> {
        let changed = self.db.with_tx(|conn| -> Result<usize> {
            Ok(queries::mark_notification_read(conn, id)?)
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound("notification"));
        }
        Ok(())
    }

    // -- Views --

    pub fn unread_for_user(&self, user_id: Uuid, order: UnreadOrder) -> Result<Vec<MessageSummary>> {
        unread::unread_for_user(&self.db, user_id, order)
    }

    pub fn threaded_conversation(
        &self,
        user1: Uuid,
        user2: Uuid,
        requester: Uuid,
        depth: ThreadDepth,
    ) -> Result<Vec<ThreadedMessage>> {
        threads::threaded_conversation(&self.db, user1, user2, requester, depth)
    }
}
