//! Per-user last-read markers.
//!
//! One row per `(chat, user)` pair. The upsert is monotonic: an update with
//! a timestamp at or before the stored marker changes nothing, which guards
//! against out-of-order delivery of mark-read calls.

use chrono::{DateTime, Utc};
use rusqlite::params;

use veil_shared::types::{ChatId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::util::{fmt_ts, parse_ts};

impl Database {
    /// The viewer's last-read marker, or `None` if they have never marked
    /// the chat read.
    pub fn last_read_at(&self, chat_id: ChatId, user: UserId) -> Result<Option<DateTime<Utc>>> {
        let result = self.conn().query_row(
            "SELECT last_read_at FROM read_state WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id.to_string(), user.to_string()],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(s) => Ok(Some(parse_ts(0, &s)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Advance the marker. Returns `false` when `at` is not newer than the
    /// stored value (the stale update is a silent no-op).
    pub fn mark_read(&self, chat_id: ChatId, user: UserId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT INTO read_state (chat_id, user_id, last_read_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id, user_id) DO UPDATE SET last_read_at = excluded.last_read_at
             WHERE excluded.last_read_at > read_state.last_read_at",
            params![chat_id.to_string(), user.to_string(), fmt_ts(at)],
        )?;
        Ok(affected > 0)
    }
}
