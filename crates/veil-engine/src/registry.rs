//! The chat registry: chat identity, participant pairing, and counters.
//!
//! This component is the sole writer of the `chats` table. Everything that
//! mutates a chat record (creation, reveal transitions, the message-count
//! ratchet, activity bumps) goes through here, which keeps the
//! single-writer discipline auditable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use veil_shared::alias;
use veil_shared::types::{pair_key, ChatId, ChatState, UserId};
use veil_store::{Chat, Database};

use crate::error::{EngineError, Result};

pub(crate) type SharedDb = Arc<Mutex<Database>>;

pub(crate) struct ChatRegistry {
    db: SharedDb,
}

impl ChatRegistry {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Resolve the unordered pair to its single chat, creating one in
    /// state `anonymous` with freshly assigned aliases if none exists.
    pub async fn get_or_create(&self, a: UserId, b: UserId) -> Result<Chat> {
        if a == b {
            return Err(EngineError::SameUser);
        }

        let key = pair_key(a, b);
        let db = self.db.lock().await;

        if let Some(existing) = db.get_chat_by_pair(&key)? {
            return Ok(existing);
        }

        let (alias_a, alias_b) = alias::random_pair();
        let now = Utc::now();
        let chat = Chat {
            id: ChatId::new(),
            pair_key: key,
            participant_a: a,
            participant_b: b,
            alias_a,
            alias_b,
            state: ChatState::Anonymous,
            message_count: 0,
            reveal_requested_by: None,
            reveal_requested_at: None,
            revealed_at: None,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        };
        db.insert_chat(&chat)?;

        info!(chat = %chat.id, "Created chat");
        Ok(chat)
    }

    /// Load a chat by id.
    pub async fn get(&self, chat_id: ChatId) -> Result<Chat> {
        let db = self.db.lock().await;
        db.get_chat(chat_id).map_err(EngineError::for_chat)
    }

    /// Load a chat and verify the actor is one of its two participants.
    pub async fn get_for(&self, chat_id: ChatId, actor: UserId) -> Result<Chat> {
        let chat = self.get(chat_id).await?;
        if !chat.is_participant(actor) {
            return Err(EngineError::NotAuthorized);
        }
        Ok(chat)
    }

    /// One page of a user's chats, most recent activity first.
    pub async fn list_page(
        &self,
        user: UserId,
        before: Option<(DateTime<Utc>, ChatId)>,
        limit: u32,
    ) -> Result<Vec<Chat>> {
        let db = self.db.lock().await;
        Ok(db.list_chats_for_user(user, before, limit)?)
    }

    /// Record one counted message: advances the ratchet and the activity
    /// timestamp. Invoked only for participant-authored text messages.
    pub async fn note_counted_message(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        Ok(db.bump_message_count(chat_id, at)?)
    }

    /// Record activity without touching the counter (synthetic messages).
    pub async fn note_activity(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        Ok(db.touch_chat_activity(chat_id, at)?)
    }

    /// Apply `anonymous -> reveal_pending`. `false` means the swap lost.
    pub async fn begin_reveal(
        &self,
        chat_id: ChatId,
        requester: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        Ok(db.begin_reveal(chat_id, requester, at)?)
    }

    /// Apply `reveal_pending -> normal`. `false` means the swap lost.
    pub async fn complete_reveal(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        Ok(db.complete_reveal(chat_id, at)?)
    }

    /// Apply `reveal_pending -> anonymous`. `false` means the swap lost.
    pub async fn cancel_reveal(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        Ok(db.cancel_reveal(chat_id, at)?)
    }
}
