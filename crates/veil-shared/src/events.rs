//! Notification event payloads.
//!
//! The engine reports "something happened" facts to an external dispatch
//! channel; push fan-out, websockets, and digest mail are that channel's
//! concern. Payloads are serialized as JSON; the event name constants are
//! the routing keys.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ChatId, ChatState, MessageId, MessageKind, UserId};

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_REVEAL_STATE_CHANGED: &str = "reveal-state-changed";

#[derive(Debug, Clone, Serialize)]
pub struct NewMessagePayload {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub kind: MessageKind,
    pub sender_id: UserId,
    /// The participant who should be notified.
    pub recipient_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealStateChangedPayload {
    pub chat_id: ChatId,
    pub state: ChatState,
    /// The participant whose action caused the transition.
    pub changed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}
