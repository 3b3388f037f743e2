//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the
//! projection layer; deserialization is never needed because rows are
//! rebuilt through the typed row mappers in each CRUD module.

use chrono::{DateTime, Utc};
use serde::Serialize;

use veil_shared::types::{ChatId, ChatState, MessageId, MessageKind, UserId};

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One pseudonymous conversation between exactly two participants.
///
/// The participant pair is immutable after creation and unique: `pair_key`
/// is the canonical sorted form of the two user ids and carries a UNIQUE
/// constraint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    /// Canonical `min|max` form of the participant pair.
    pub pair_key: String,
    pub participant_a: UserId,
    pub participant_b: UserId,
    /// Anonymous display name shown for participant A, assigned at creation.
    pub alias_a: String,
    /// Anonymous display name shown for participant B, assigned at creation.
    pub alias_b: String,
    pub state: ChatState,
    /// Ratcheted count of participant-authored text messages. Never
    /// decremented, not even when messages are later soft-deleted.
    pub message_count: i64,
    /// Set exactly while `state == RevealPending`.
    pub reveal_requested_by: Option<UserId>,
    pub reveal_requested_at: Option<DateTime<Utc>>,
    /// Set exactly once, at the transition into `Normal`.
    pub revealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Drives inbox ordering: bumped on every message append.
    pub last_activity_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user: UserId) -> bool {
        user == self.participant_a || user == self.participant_b
    }

    /// The other side of the chat, if `user` is a participant.
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if user == self.participant_a {
            Some(self.participant_b)
        } else if user == self.participant_b {
            Some(self.participant_a)
        } else {
            None
        }
    }

    /// The anonymous alias assigned to `user`, if they are a participant.
    pub fn alias_of(&self, user: UserId) -> Option<&str> {
        if user == self.participant_a {
            Some(&self.alias_a)
        } else if user == self.participant_b {
            Some(&self.alias_b)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single unit of conversation content.
///
/// `seq` is a per-chat monotonic sequence number (1-based) that makes
/// creation order recoverable independent of wall-clock timestamps.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub kind: MessageKind,
    /// Empty only for non-text kinds.
    pub content: String,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_by: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// ReadState
// ---------------------------------------------------------------------------

/// Last-read marker for one `(chat, user)` pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReadState {
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// The user has read everything created at or before this instant.
    pub last_read_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Local cache of a user's real identity, fed by the platform's identity
/// service. Only consulted for chats that have completed a reveal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_between(a: UserId, b: UserId) -> Chat {
        let now = Utc::now();
        Chat {
            id: ChatId::new(),
            pair_key: veil_shared::types::pair_key(a, b),
            participant_a: a,
            participant_b: b,
            alias_a: "Misty Otter".into(),
            alias_b: "Silent Wren".into(),
            state: ChatState::Anonymous,
            message_count: 0,
            reveal_requested_by: None,
            reveal_requested_at: None,
            revealed_at: None,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    #[test]
    fn partner_resolution() {
        let a = UserId::new();
        let b = UserId::new();
        let chat = chat_between(a, b);

        assert_eq!(chat.partner_of(a), Some(b));
        assert_eq!(chat.partner_of(b), Some(a));
        assert_eq!(chat.partner_of(UserId::new()), None);
    }

    #[test]
    fn alias_resolution() {
        let a = UserId::new();
        let b = UserId::new();
        let chat = chat_between(a, b);

        assert_eq!(chat.alias_of(a), Some("Misty Otter"));
        assert_eq!(chat.alias_of(b), Some("Silent Wren"));
        assert_eq!(chat.alias_of(UserId::new()), None);
    }
}
