//! Opaque pagination cursors.
//!
//! Cursors are handed to callers as URL-safe base64 strings. The encoded
//! layout is an implementation detail: callers must treat the string as a
//! token and pass it back verbatim. A cursor that fails to decode is
//! reported as [`CursorError::Malformed`] rather than silently restarting
//! the listing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::ChatId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    /// The cursor string is not one this service produced.
    #[error("malformed pagination cursor")]
    Malformed,
}

/// Resume point in a chat transcript: the per-chat sequence number of the
/// last message already delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCursor {
    pub seq: i64,
}

impl MessageCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("s:{}", self.seq))
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let raw = decode_utf8(token)?;
        let seq = raw
            .strip_prefix("s:")
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CursorError::Malformed)?;
        Ok(Self { seq })
    }
}

/// Resume point in a user's inbox: activity timestamp and chat id of the
/// last entry already delivered. The id breaks ties between chats with
/// identical activity timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatCursor {
    pub last_activity_at: DateTime<Utc>,
    pub chat_id: ChatId,
}

impl ChatCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!(
            "a:{}|{}",
            self.last_activity_at.to_rfc3339(),
            self.chat_id
        ))
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let raw = decode_utf8(token)?;
        let rest = raw.strip_prefix("a:").ok_or(CursorError::Malformed)?;
        let (ts_str, id_str) = rest.split_once('|').ok_or(CursorError::Malformed)?;

        let last_activity_at = DateTime::parse_from_rfc3339(ts_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| CursorError::Malformed)?;
        let chat_id = Uuid::parse_str(id_str).map_err(|_| CursorError::Malformed)?;

        Ok(Self {
            last_activity_at,
            chat_id: ChatId(chat_id),
        })
    }
}

fn decode_utf8(token: &str) -> Result<String, CursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CursorError::Malformed)?;
    String::from_utf8(bytes).map_err(|_| CursorError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_cursor_round_trip() {
        let cursor = MessageCursor { seq: 42 };
        assert_eq!(MessageCursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn chat_cursor_round_trip() {
        let cursor = ChatCursor {
            last_activity_at: Utc::now(),
            chat_id: ChatId::new(),
        };
        let decoded = ChatCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.chat_id, cursor.chat_id);
        assert_eq!(decoded.last_activity_at, cursor.last_activity_at);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(MessageCursor::decode("???"), Err(CursorError::Malformed));
        assert_eq!(ChatCursor::decode("bm90LWEtY3Vyc29y"), Err(CursorError::Malformed));
    }

    #[test]
    fn cursor_kinds_are_not_interchangeable() {
        let msg = MessageCursor { seq: 7 }.encode();
        assert!(ChatCursor::decode(&msg).is_err());
    }
}
