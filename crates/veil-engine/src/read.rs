//! The read-state tracker.
//!
//! Sole writer of the `read_state` table. Markers are per `(chat, user)`
//! and independent of everything else, so the only coordination needed is
//! the monotonic upsert in the store: a stale timestamp loses quietly.

use chrono::{DateTime, Utc};
use tracing::debug;

use veil_shared::types::{ChatId, UserId};

use crate::error::Result;
use crate::registry::SharedDb;

pub(crate) struct ReadTracker {
    db: SharedDb,
}

impl ReadTracker {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Advance the viewer's last-read marker. Out-of-order updates are
    /// silently ignored; the caller has already validated the chat and
    /// the viewer's membership.
    pub async fn mark_read(&self, chat_id: ChatId, user: UserId, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        let advanced = db.mark_read(chat_id, user, at)?;
        if !advanced {
            debug!(chat = %chat_id, user = %user, "Stale mark-read ignored");
        }
        Ok(())
    }

    /// Messages the viewer has not seen: non-deleted, from the other side,
    /// created after their marker (or all of them if they never marked).
    pub async fn unread_count(&self, chat_id: ChatId, viewer: UserId) -> Result<i64> {
        let db = self.db.lock().await;
        let since = db.last_read_at(chat_id, viewer)?;
        Ok(db.count_unread(chat_id, viewer, since)?)
    }
}
