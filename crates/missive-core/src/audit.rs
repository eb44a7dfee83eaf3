use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use missive_db::queries;
use missive_types::models::{Message, MessageHistory};

use crate::Result;
use crate::hooks::Hook;

/// Records the previous content of a message whenever an update changes it,
/// and flags the message as edited.
///
/// The editor's identity is not available at this point, so `edited_by` is
/// always left empty.
pub struct EditAuditHook;

impl Hook for EditAuditHook {
    fn name(&self) -> &'static str {
        "edit_audit"
    }

    fn pre_update_message(&self, conn: &Connection, message: &mut Message) -> Result<()> {
        let Some(persisted) = queries::get_message(conn, message.id)? else {
            // Deleted between read and write: not an edit.
            debug!(message_id = %message.id, "Message vanished before update, skipping audit");
            return Ok(());
        };

        if persisted.content == message.content {
            return Ok(());
        }

        let now = missive_db::now();
        queries::insert_history(
            conn,
            &MessageHistory {
                id: Uuid::new_v4(),
                original_message_id: persisted.id,
                old_content: persisted.content,
                edited_by: None,
                edited_at: now,
            },
        )?;

        message.edited = true;
        message.edited_at = Some(now);

        debug!(message_id = %message.id, "Recorded edit history");
        Ok(())
    }
}
