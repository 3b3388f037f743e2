//! The inbox projection: the read-only views handed to callers.
//!
//! No mutable state of its own. This module is the single place that
//! decides what identity a viewer sees: the masking rule lives in
//! `display_identity` and nowhere else, so no caller can leak a real name
//! before a reveal. Pre-reveal code paths never even consult the identity
//! provider.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use veil_shared::constants::{DELETED_PLACEHOLDER, PREVIEW_LEN};
use veil_shared::types::{ChatId, ChatState, MessageId, MessageKind, UserId};
use veil_store::{Chat, Message};

use crate::error::{EngineError, Result};
use crate::identity::IdentityProvider;
use crate::reveal::{self, RevealEligibility};

/// A chat as one participant sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub id: ChatId,
    pub state: ChatState,
    /// The viewer's own pseudonym in this chat.
    pub my_alias: String,
    pub partner_display_name: String,
    pub partner_avatar_url: Option<String>,
    pub message_count: i64,
    pub eligibility: RevealEligibility,
    /// `Some(true)` if the viewer made the pending request, `Some(false)`
    /// if the partner did; `None` when no reveal is pending.
    pub reveal_requested_by_me: Option<bool>,
    pub reveal_requested_at: Option<DateTime<Utc>>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// One row of a user's chat list.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub chat_id: ChatId,
    pub state: ChatState,
    pub partner_display_name: String,
    pub partner_avatar_url: Option<String>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

/// One transcript entry as a given viewer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub seq: i64,
    pub kind: MessageKind,
    pub content: String,
    pub sender_display_name: String,
    pub is_own: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

pub(crate) struct InboxProjection {
    identity: Arc<dyn IdentityProvider>,
    reveal_threshold: u32,
    show_deleted_placeholder: bool,
}

impl InboxProjection {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        reveal_threshold: u32,
        show_deleted_placeholder: bool,
    ) -> Self {
        Self {
            identity,
            reveal_threshold,
            show_deleted_placeholder,
        }
    }

    /// THE masking rule: a participant's real identity is visible iff the
    /// chat has reached `normal` and the identity service knows them;
    /// otherwise their per-chat alias stands in and no lookup happens.
    fn display_identity(&self, chat: &Chat, subject: UserId) -> (String, Option<String>) {
        let alias = chat.alias_of(subject).unwrap_or_default().to_string();

        if chat.state == ChatState::Normal {
            if let Some(profile) = self.identity.real_profile(subject) {
                return (profile.display_name.unwrap_or(alias), profile.avatar_url);
            }
        }
        (alias, None)
    }

    /// Project a chat for one of its participants.
    pub fn chat_view(&self, chat: &Chat, viewer: UserId) -> Result<ChatView> {
        let partner = chat.partner_of(viewer).ok_or(EngineError::NotAuthorized)?;
        let (partner_display_name, partner_avatar_url) = self.display_identity(chat, partner);

        Ok(ChatView {
            id: chat.id,
            state: chat.state,
            my_alias: chat.alias_of(viewer).unwrap_or_default().to_string(),
            partner_display_name,
            partner_avatar_url,
            message_count: chat.message_count,
            eligibility: reveal::eligibility(chat, self.reveal_threshold),
            reveal_requested_by_me: chat.reveal_requested_by.map(|by| by == viewer),
            reveal_requested_at: chat.reveal_requested_at,
            revealed_at: chat.revealed_at,
            created_at: chat.created_at,
            last_activity_at: chat.last_activity_at,
        })
    }

    /// Build one chat-list row. `preview` is the chat's latest non-deleted
    /// message, already fetched by the engine.
    pub fn inbox_entry(
        &self,
        chat: &Chat,
        viewer: UserId,
        preview: Option<&Message>,
        unread_count: i64,
    ) -> Result<InboxEntry> {
        let partner = chat.partner_of(viewer).ok_or(EngineError::NotAuthorized)?;
        let (partner_display_name, partner_avatar_url) = self.display_identity(chat, partner);

        Ok(InboxEntry {
            chat_id: chat.id,
            state: chat.state,
            partner_display_name,
            partner_avatar_url,
            last_message_preview: preview.map(|m| truncate_preview(&m.content)),
            last_message_at: preview.map(|m| m.created_at),
            unread_count,
        })
    }

    /// Project one transcript entry for a viewer. Returns `None` when the
    /// message is hidden from them entirely (deleted, and the deployment
    /// does not show placeholders).
    pub fn message_view(
        &self,
        chat: &Chat,
        viewer: UserId,
        message: &Message,
    ) -> Option<MessageView> {
        let is_own = message.sender_id == viewer;
        let (sender_display_name, _) = self.display_identity(chat, message.sender_id);

        let (content, deleted) = if message.is_deleted() {
            if message.deleted_by == Some(viewer) {
                // The deleting sender keeps their own audit view.
                (message.content.clone(), true)
            } else if self.show_deleted_placeholder {
                (DELETED_PLACEHOLDER.to_string(), true)
            } else {
                return None;
            }
        } else {
            (message.content.clone(), false)
        };

        Some(MessageView {
            id: message.id,
            chat_id: message.chat_id,
            seq: message.seq,
            kind: message.kind,
            content,
            sender_display_name,
            is_own,
            deleted,
            created_at: message.created_at,
        })
    }
}

fn truncate_preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LEN {
        content.to_string()
    } else {
        let cut: String = content.chars().take(PREVIEW_LEN).collect();
        format!("{cut}…")
    }
}
