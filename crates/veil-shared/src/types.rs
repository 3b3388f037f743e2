use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// User identity is an opaque UUID issued by the surrounding platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a stored enum string does not match any variant.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle state of a chat.
///
/// `Anonymous` is the initial state. `RevealPending` means one participant
/// has proposed revealing identities and the other has not yet answered.
/// `Normal` is terminal: both identities are visible for the rest of the
/// chat's lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Anonymous,
    RevealPending,
    Normal,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::Anonymous => "anonymous",
            ChatState::RevealPending => "reveal_pending",
            ChatState::Normal => "normal",
        }
    }
}

impl std::fmt::Display for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(ChatState::Anonymous),
            "reveal_pending" => Ok(ChatState::RevealPending),
            "normal" => Ok(ChatState::Normal),
            other => Err(ParseEnumError {
                kind: "chat state",
                value: other.to_string(),
            }),
        }
    }
}

/// Kind of a message in a chat transcript.
///
/// `Text` is participant-authored. The `Reveal*` kinds are synthesized by
/// the reveal state machine so the transcript stays the single ordered
/// record of everything that happened in a chat. `System` covers any other
/// engine-authored notice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    System,
    RevealRequest,
    RevealAccepted,
    RevealDeclined,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::System => "system",
            MessageKind::RevealRequest => "reveal_request",
            MessageKind::RevealAccepted => "reveal_accepted",
            MessageKind::RevealDeclined => "reveal_declined",
        }
    }

    /// Only participant-authored text counts toward the reveal threshold.
    pub fn counts_toward_reveal(&self) -> bool {
        matches!(self, MessageKind::Text)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "system" => Ok(MessageKind::System),
            "reveal_request" => Ok(MessageKind::RevealRequest),
            "reveal_accepted" => Ok(MessageKind::RevealAccepted),
            "reveal_declined" => Ok(MessageKind::RevealDeclined),
            other => Err(ParseEnumError {
                kind: "message kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Canonical key for the unordered participant pair of a chat.
///
/// The two UUIDs are sorted so `(a, b)` and `(b, a)` map to the same key,
/// which backs the uniqueness constraint "at most one chat per pair".
pub fn pair_key(a: UserId, b: UserId) -> String {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    format!("{lo}|{hi}")
}
