use uuid::Uuid;

use missive_db::{Database, queries};
use missive_types::api::MessageSummary;

use crate::Result;

pub use missive_db::models::UnreadOrder;

/// Unread messages addressed to `user_id`, as summaries. Never marks
/// anything read.
pub fn unread_for_user(db: &Database, user_id: Uuid, order: UnreadOrder) -> Result<Vec<MessageSummary>> {
    Ok(db.with_conn(|conn| queries::unread_summaries(conn, user_id, order))?)
}

pub fn unread_count(db: &Database, user_id: Uuid) -> Result<u64> {
    Ok(db.with_conn(|conn| queries::count_unread(conn, user_id))?)
}
