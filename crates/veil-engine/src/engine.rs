//! The engine facade: every operation exposed to callers.
//!
//! Control flow follows the component split. A mutation acquires the
//! chat's lock, loads the record, lets the pure reveal machinery decide,
//! applies the decision through the registry (compare-and-swap), and
//! appends whatever the transcript needs. Notification facts go to the
//! dispatcher only after the critical section ends.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use veil_shared::cursor::{ChatCursor, MessageCursor};
use veil_shared::events::{NewMessagePayload, RevealStateChangedPayload};
use veil_shared::types::{ChatId, ChatState, MessageId, MessageKind, UserId};
use veil_store::{Chat, Database, Message};

use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use crate::identity::IdentityProvider;
use crate::inbox::{ChatView, InboxEntry, InboxProjection, MessageView};
use crate::locks::ChatLocks;
use crate::log::MessageLog;
use crate::read::ReadTracker;
use crate::registry::ChatRegistry;
use crate::reveal;
use crate::Page;

pub struct ChatEngine {
    registry: ChatRegistry,
    log: MessageLog,
    tracker: ReadTracker,
    inbox: InboxProjection,
    locks: ChatLocks,
    config: EngineConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

impl ChatEngine {
    pub fn new(
        db: Database,
        config: EngineConfig,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let db = Arc::new(Mutex::new(db));
        let inbox = InboxProjection::new(
            identity,
            config.reveal_threshold,
            config.show_deleted_placeholder,
        );

        Self {
            registry: ChatRegistry::new(db.clone()),
            log: MessageLog::new(db.clone()),
            tracker: ReadTracker::new(db),
            inbox,
            locks: ChatLocks::new(),
            config,
            dispatcher,
        }
    }

    /// Handle to the per-chat lock table, for the maintenance task that
    /// purges idle entries.
    pub fn locks(&self) -> ChatLocks {
        self.locks.clone()
    }

    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    /// Resolve (or create) the chat between two users, projected for the
    /// caller `user_a`.
    pub async fn start_chat(&self, user_a: UserId, user_b: UserId) -> Result<ChatView> {
        let chat = self.registry.get_or_create(user_a, user_b).await?;
        self.inbox.chat_view(&chat, user_a)
    }

    /// A chat projected for one of its participants.
    pub async fn get_chat(&self, chat_id: ChatId, viewer: UserId) -> Result<ChatView> {
        let chat = self.registry.get_for(chat_id, viewer).await?;
        self.inbox.chat_view(&chat, viewer)
    }

    /// One page of the viewer's inbox, most recent activity first.
    pub async fn list_chats(
        &self,
        user: UserId,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<InboxEntry>> {
        let limit = self.config.page_size(limit);
        let before = cursor
            .map(ChatCursor::decode)
            .transpose()?
            .map(|c| (c.last_activity_at, c.chat_id));

        let mut chats = self.registry.list_page(user, before, limit + 1).await?;
        let has_more = chats.len() > limit as usize;
        chats.truncate(limit as usize);

        let mut items = Vec::with_capacity(chats.len());
        for chat in &chats {
            let preview = self.log.last_visible(chat.id).await?;
            let unread = self.tracker.unread_count(chat.id, user).await?;
            items.push(self.inbox.inbox_entry(chat, user, preview.as_ref(), unread)?);
        }

        let next_cursor = if has_more {
            chats.last().map(|c| {
                ChatCursor {
                    last_activity_at: c.last_activity_at,
                    chat_id: c.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Append a participant-authored text message. The critical section
    /// covers only sequence assignment and the counter bump.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        sender: UserId,
        text: &str,
    ) -> Result<Message> {
        let chat;
        let message;
        {
            let _guard = self.locks.acquire(chat_id).await;
            chat = self.registry.get(chat_id).await?;
            if !chat.is_participant(sender) {
                return Err(EngineError::InvalidSender);
            }

            let now = Utc::now();
            message = self
                .log
                .append(chat_id, sender, MessageKind::Text, text, now)
                .await?;
            self.registry.note_counted_message(chat_id, now).await?;
        }

        self.notify_message(&chat, &message);
        Ok(message)
    }

    /// Soft-delete a message. Counter contributions already made are never
    /// retracted, so no chat lock is needed; only the message row changes.
    pub async fn delete_message(&self, message_id: MessageId, deleter: UserId) -> Result<()> {
        self.log.soft_delete(message_id, deleter, Utc::now()).await
    }

    /// One page of a chat's transcript, oldest first, projected for the
    /// viewer.
    pub async fn list_messages(
        &self,
        chat_id: ChatId,
        viewer: UserId,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<MessageView>> {
        let chat = self.registry.get_for(chat_id, viewer).await?;
        let limit = self.config.page_size(limit);
        let after = cursor
            .map(MessageCursor::decode)
            .transpose()?
            .map(|c| c.seq);

        let (rows, has_more) = self.log.page(chat_id, after, limit).await?;

        let next_cursor = if has_more {
            rows.last().map(|m| MessageCursor { seq: m.seq }.encode())
        } else {
            None
        };

        let items = rows
            .iter()
            .filter_map(|m| self.inbox.message_view(&chat, viewer, m))
            .collect();

        Ok(Page { items, next_cursor })
    }

    /// Advance the viewer's read marker; stale timestamps are a no-op.
    pub async fn mark_read(
        &self,
        chat_id: ChatId,
        user: UserId,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.registry.get_for(chat_id, user).await?;
        self.tracker
            .mark_read(chat_id, user, at.unwrap_or_else(Utc::now))
            .await
    }

    // ------------------------------------------------------------------
    // Reveal transitions
    // ------------------------------------------------------------------

    /// Propose revealing identities. Valid only from `anonymous`, once the
    /// message-count threshold is met.
    pub async fn request_reveal(&self, chat_id: ChatId, requester: UserId) -> Result<ChatView> {
        let chat;
        let message;
        {
            let _guard = self.locks.acquire(chat_id).await;
            let loaded = self.registry.get(chat_id).await?;
            reveal::check_request(&loaded, requester, self.config.reveal_threshold)?;

            let now = Utc::now();
            if !self.registry.begin_reveal(chat_id, requester, now).await? {
                return Err(EngineError::InvalidState {
                    expected: ChatState::Anonymous,
                });
            }
            message = self
                .log
                .append(chat_id, requester, MessageKind::RevealRequest, "", now)
                .await?;
            self.registry.note_activity(chat_id, now).await?;
            chat = loaded;
        }

        info!(chat = %chat_id, user = %requester.short(), "Reveal requested");
        self.notify_reveal(&chat, requester, ChatState::RevealPending, message.created_at);
        self.notify_message(&chat, &message);

        self.get_chat(chat_id, requester).await
    }

    /// Accept a pending reveal: the chat becomes `normal` for good.
    pub async fn accept_reveal(&self, chat_id: ChatId, responder: UserId) -> Result<ChatView> {
        let chat;
        let message;
        {
            let _guard = self.locks.acquire(chat_id).await;
            let loaded = self.registry.get(chat_id).await?;
            reveal::check_response(&loaded, responder)?;

            let now = Utc::now();
            if !self.registry.complete_reveal(chat_id, now).await? {
                return Err(EngineError::InvalidState {
                    expected: ChatState::RevealPending,
                });
            }
            message = self
                .log
                .append(chat_id, responder, MessageKind::RevealAccepted, "", now)
                .await?;
            self.registry.note_activity(chat_id, now).await?;
            chat = loaded;
        }

        info!(chat = %chat_id, user = %responder.short(), "Reveal accepted");
        self.notify_reveal(&chat, responder, ChatState::Normal, message.created_at);
        self.notify_message(&chat, &message);

        self.get_chat(chat_id, responder).await
    }

    /// Decline a pending reveal: back to `anonymous`. The pair may try
    /// again later; there is no cooldown.
    pub async fn decline_reveal(&self, chat_id: ChatId, responder: UserId) -> Result<ChatView> {
        let chat;
        let message;
        {
            let _guard = self.locks.acquire(chat_id).await;
            let loaded = self.registry.get(chat_id).await?;
            reveal::check_response(&loaded, responder)?;

            let now = Utc::now();
            if !self.registry.cancel_reveal(chat_id, now).await? {
                return Err(EngineError::InvalidState {
                    expected: ChatState::RevealPending,
                });
            }
            message = self
                .log
                .append(chat_id, responder, MessageKind::RevealDeclined, "", now)
                .await?;
            self.registry.note_activity(chat_id, now).await?;
            chat = loaded;
        }

        info!(chat = %chat_id, user = %responder.short(), "Reveal declined");
        self.notify_reveal(&chat, responder, ChatState::Anonymous, message.created_at);
        self.notify_message(&chat, &message);

        self.get_chat(chat_id, responder).await
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn notify_message(&self, chat: &Chat, message: &Message) {
        if let Some(recipient) = chat.partner_of(message.sender_id) {
            self.dispatcher.message_created(NewMessagePayload {
                chat_id: chat.id,
                message_id: message.id,
                kind: message.kind,
                sender_id: message.sender_id,
                recipient_id: recipient,
                created_at: message.created_at,
            });
        }
    }

    fn notify_reveal(
        &self,
        chat: &Chat,
        changed_by: UserId,
        state: ChatState,
        occurred_at: DateTime<Utc>,
    ) {
        self.dispatcher
            .reveal_state_changed(RevealStateChangedPayload {
                chat_id: chat.id,
                state,
                changed_by,
                occurred_at,
            });
    }
}
