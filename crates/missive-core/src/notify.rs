use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use missive_db::queries;
use missive_types::models::{Message, Notification};

use crate::Result;
use crate::hooks::Hook;

/// Emits one notification to the receiver of every newly created message.
pub struct NotificationHook;

impl Hook for NotificationHook {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn post_create_message(&self, conn: &Connection, message: &Message) -> Result<()> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: message.receiver_id,
            message_id: message.id,
            is_read: false,
            created_at: missive_db::now(),
        };
        queries::insert_notification(conn, &notification)?;

        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            "Notification created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use missive_db::Database;
    use missive_types::models::NewMessage;

    use super::*;
    use crate::{HookChain, Store};

    fn store() -> Store {
        Store::new(Database::open_in_memory().unwrap(), HookChain::new().with(NotificationHook))
    }

    #[test]
    fn new_message_notifies_receiver_once() {
        let store = store();
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();

        let sent = store.send_message(NewMessage::new(alice.id, bob.id, "hi")).unwrap();

        let for_bob = store.notifications_for_user(bob.id, false).unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].message_id, sent.id);
        assert_eq!(for_bob[0].user_id, bob.id);
        assert!(!for_bob[0].is_read);
        assert!(store.notifications_for_user(alice.id, false).unwrap().is_empty());
    }

    #[test]
    fn updates_do_not_notify() {
        let store = store();
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        let sent = store.send_message(NewMessage::new(alice.id, bob.id, "hi")).unwrap();

        store.edit_message(sent.id, "hello").unwrap();
        store.mark_message_read(sent.id).unwrap();

        assert_eq!(store.notifications_for_user(bob.id, false).unwrap().len(), 1);
    }

    #[test]
    fn marking_read_filters_unread_list() {
        let store = store();
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        store.send_message(NewMessage::new(alice.id, bob.id, "one")).unwrap();
        store.send_message(NewMessage::new(alice.id, bob.id, "two")).unwrap();

        let all = store.notifications_for_user(bob.id, false).unwrap();
        store.mark_notification_read(all[0].id).unwrap();

        let unread = store.notifications_for_user(bob.id, true).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, all[1].id);
    }
}
