use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use missive_types::models::Message;

use crate::Result;
use crate::audit::EditAuditHook;
use crate::cleanup::CascadeCleanupHook;
use crate::notify::NotificationHook;

/// A callback invoked synchronously at a fixed point of an entity's
/// mutation lifecycle.
///
/// Every method runs on the connection of the triggering write, inside its
/// transaction. Returning `Err` aborts the write and rolls it back. Hooks
/// override only the points they care about.
pub trait Hook: Send + Sync {
    fn name(&self) -> &'static str;

    /// Before an existing message's stored fields are replaced. `message`
    /// carries the proposed values and may be adjusted in place.
    fn pre_update_message(&self, _conn: &Connection, _message: &mut Message) -> Result<()> {
        Ok(())
    }

    /// After a new message row has been inserted.
    fn post_create_message(&self, _conn: &Connection, _message: &Message) -> Result<()> {
        Ok(())
    }

    /// After a user row has been deleted.
    fn post_delete_user(&self, _conn: &Connection, _user_id: Uuid) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of hooks. Dispatch runs them in registration order and
/// stops at the first error.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit audit, notification, cascade cleanup.
    pub fn standard() -> Self {
        Self::new()
            .with(EditAuditHook)
            .with(NotificationHook)
            .with(CascadeCleanupHook)
    }

    pub fn with(mut self, hook: impl Hook + 'static) -> Self {
        self.register(Box::new(hook));
        self
    }

    pub fn register(&mut self, hook: Box<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn pre_update_message(&self, conn: &Connection, message: &mut Message) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), message_id = %message.id, "pre_update_message");
            hook.pre_update_message(conn, message)?;
        }
        Ok(())
    }

    pub(crate) fn post_create_message(&self, conn: &Connection, message: &Message) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), message_id = %message.id, "post_create_message");
            hook.post_create_message(conn, message)?;
        }
        Ok(())
    }

    pub(crate) fn post_delete_user(&self, conn: &Connection, user_id: Uuid) -> Result<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), %user_id, "post_delete_user");
            hook.post_delete_user(conn, user_id)?;
        }
        Ok(())
    }
}
