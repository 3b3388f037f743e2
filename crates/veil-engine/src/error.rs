use thiserror::Error;

use veil_shared::cursor::CursorError;
use veil_shared::types::ChatState;
use veil_store::StoreError;

/// Failures reported to callers of the engine.
///
/// Everything here is a typed, caller-visible outcome; the engine never
/// swallows one. The two sanctioned silent no-ops (repeat soft-delete,
/// stale mark-read) succeed without an error instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Chat not found")]
    ChatNotFound,

    #[error("Message not found")]
    MessageNotFound,

    /// The actor is not a participant, or not permitted this action
    /// (e.g. accepting their own reveal request).
    #[error("Not authorized for this action")]
    NotAuthorized,

    /// The operation is not valid from the chat's current state: the
    /// caller lost a race or acted on stale data and should refetch.
    #[error("Chat is not in the required state (expected {expected})")]
    InvalidState { expected: ChatState },

    /// The reveal threshold is unmet.
    #[error("Reveal threshold not met: {current} of {required} counted messages")]
    NotEligible { required: u32, current: u32 },

    #[error("A chat needs two distinct participants")]
    SameUser,

    /// Message attribution violates the chat's participant set.
    #[error("Sender is not a participant of this chat")]
    InvalidSender,

    #[error("Malformed pagination cursor")]
    InvalidCursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Map a store lookup failure for a chat id: absent row becomes the
    /// typed `ChatNotFound`, anything else passes through.
    pub(crate) fn for_chat(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::ChatNotFound,
            other => EngineError::Store(other),
        }
    }

    /// Same mapping for message lookups.
    pub(crate) fn for_message(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::MessageNotFound,
            other => EngineError::Store(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
