use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use missive_db::queries;

use crate::Result;
use crate::hooks::Hook;

/// Removes every message a deleted user sent or received. History rows,
/// notifications and replies go with them through foreign key cascades.
pub struct CascadeCleanupHook;

impl Hook for CascadeCleanupHook {
    fn name(&self) -> &'static str {
        "cascade_cleanup"
    }

    fn post_delete_user(&self, conn: &Connection, user_id: Uuid) -> Result<()> {
        let removed = queries::delete_messages_involving(conn, user_id)?;
        info!(%user_id, removed, "Removed messages of deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use missive_db::Database;
    use missive_types::models::NewMessage;

    use super::*;
    use crate::{HookChain, Store};

    #[test]
    fn removes_both_directions_and_keeps_others() {
        let store = Store::new(
            Database::open_in_memory().unwrap(),
            HookChain::new().with(CascadeCleanupHook),
        );
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        let carol = store.create_user("carol").unwrap();

        let sent = store.send_message(NewMessage::new(alice.id, bob.id, "a->b")).unwrap();
        let received = store.send_message(NewMessage::new(bob.id, alice.id, "b->a")).unwrap();
        let other = store.send_message(NewMessage::new(bob.id, carol.id, "b->c")).unwrap();

        assert!(store.delete_user(alice.id).unwrap());

        assert!(store.get_user(alice.id).unwrap().is_none());
        assert!(store.get_user(bob.id).unwrap().is_some());
        assert!(store.db().get_message(sent.id).unwrap().is_none());
        assert!(store.db().get_message(received.id).unwrap().is_none());
        let survivor = store.db().get_message(other.id).unwrap().unwrap();
        assert!(!survivor.involves(alice.id));
        assert!(sent.involves(alice.id) && received.involves(alice.id));
    }

    #[test]
    fn without_cleanup_user_delete_fails_on_commit() {
        let store = Store::new(Database::open_in_memory().unwrap(), HookChain::new());
        let alice = store.create_user("alice").unwrap();
        let bob = store.create_user("bob").unwrap();
        store.send_message(NewMessage::new(alice.id, bob.id, "hi")).unwrap();

        let err = store.delete_user(alice.id).unwrap_err();

        match err {
            crate::StoreError::Db(e) => assert!(e.is_foreign_key_violation()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.get_user(alice.id).unwrap().is_some());
    }
}
