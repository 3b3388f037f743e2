//! The message log: the append-only, per-chat ordered transcript.
//!
//! Sole writer of the `messages` table. Sequence numbers are assigned
//! here; the caller holds the chat's lock across `append`, so a chat never
//! sees two appends draw the same number. The counter side effect belongs
//! to the registry, not this component.

use chrono::{DateTime, Utc};
use tracing::debug;

use veil_shared::types::{ChatId, MessageId, MessageKind, UserId};
use veil_store::Message;

use crate::error::{EngineError, Result};
use crate::registry::SharedDb;

pub(crate) struct MessageLog {
    db: SharedDb,
}

impl MessageLog {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Append one message. The engine validates attribution and holds the
    /// chat lock. Appending is not idempotent; callers that retry must
    /// dedupe a layer up.
    pub async fn append(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        kind: MessageKind,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message> {
        let db = self.db.lock().await;
        let seq = db.next_message_seq(chat_id)?;
        let message = Message {
            id: MessageId::new(),
            chat_id,
            sender_id,
            kind,
            content: content.to_string(),
            seq,
            created_at: at,
            deleted_by: None,
            deleted_at: None,
        };
        db.insert_message(&message)?;

        debug!(chat = %chat_id, message = %message.id, seq, kind = %kind, "Appended message");
        Ok(message)
    }

    pub async fn get(&self, id: MessageId) -> Result<Message> {
        let db = self.db.lock().await;
        db.get_message(id).map_err(EngineError::for_message)
    }

    /// One raw page of the transcript, oldest first. Returns the rows and
    /// whether more follow. Visibility masking happens in the projection,
    /// so the page boundary stays stable regardless of deletions.
    pub async fn page(
        &self,
        chat_id: ChatId,
        after_seq: Option<i64>,
        limit: u32,
    ) -> Result<(Vec<Message>, bool)> {
        let db = self.db.lock().await;
        let mut rows = db.list_messages(chat_id, after_seq, limit + 1)?;
        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);
        Ok((rows, has_more))
    }

    /// Most recent non-deleted message, for inbox previews.
    pub async fn last_visible(&self, chat_id: ChatId) -> Result<Option<Message>> {
        let db = self.db.lock().await;
        Ok(db.last_visible_message(chat_id)?)
    }

    /// Soft-delete a message. Only the sender may delete their own
    /// message; deleting an already-deleted message is a no-op.
    pub async fn soft_delete(
        &self,
        id: MessageId,
        deleter: UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let message = db.get_message(id).map_err(EngineError::for_message)?;
        if message.sender_id != deleter {
            return Err(EngineError::NotAuthorized);
        }

        let marked = db.soft_delete_message(id, deleter, at)?;
        if marked {
            debug!(message = %id, "Soft-deleted message");
        }
        Ok(())
    }
}
