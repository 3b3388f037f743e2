//! CRUD operations for [`Message`] records.
//!
//! Messages are append-only; the only mutation is the soft-delete marker.
//! Ordering within a chat is the per-chat `seq` column, assigned by the
//! engine while it holds the chat's lock.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::str::FromStr;

use veil_shared::types::{ChatId, MessageId, MessageKind, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::util::{col_opt_ts, col_opt_uuid, col_ts, col_uuid, fmt_ts};

const MESSAGE_COLUMNS: &str =
    "id, chat_id, sender_id, kind, content, seq, created_at, deleted_by, deleted_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, chat_id, sender_id, kind, content, seq, created_at,
                                   deleted_by, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.sender_id.to_string(),
                message.kind.as_str(),
                message.content,
                message.seq,
                fmt_ts(message.created_at),
                message.deleted_by.map(|u| u.to_string()),
                message.deleted_at.map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Next sequence number for a chat (1-based). The engine calls this
    /// under the chat's lock, so two appends can never draw the same value.
    pub fn next_message_seq(&self, chat_id: ChatId) -> Result<i64> {
        let max: Option<i64> = self.conn().query_row(
            "SELECT MAX(seq) FROM messages WHERE chat_id = ?1",
            params![chat_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// List messages oldest-first, resuming after `after_seq`.
    pub fn list_messages(
        &self,
        chat_id: ChatId,
        after_seq: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE chat_id = ?1 AND seq > ?2
             ORDER BY seq ASC
             LIMIT ?3"
        ))?;

        let rows = stmt.query_map(
            params![chat_id.to_string(), after_seq.unwrap_or(0), limit],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Most recent non-deleted message of a chat, for the inbox preview.
    pub fn last_visible_message(&self, chat_id: ChatId) -> Result<Option<Message>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE chat_id = ?1 AND deleted_at IS NULL
                 ORDER BY seq DESC
                 LIMIT 1"
            ),
            params![chat_id.to_string()],
            row_to_message,
        );
        match result {
            Ok(message) => Ok(Some(message)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// Mark a message deleted. Returns `false` if it already carried a
    /// deletion marker (the repeat is a no-op, not an error).
    pub fn soft_delete_message(
        &self,
        id: MessageId,
        deleter: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages
             SET deleted_by = ?1, deleted_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![deleter.to_string(), fmt_ts(at), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Unread count for a viewer: non-deleted messages from the other side
    /// created strictly after the viewer's last-read marker.
    pub fn count_unread(
        &self,
        chat_id: ChatId,
        viewer: UserId,
        last_read_at: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let count = match last_read_at {
            Some(since) => self.conn().query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE chat_id = ?1 AND sender_id != ?2
                   AND deleted_at IS NULL AND created_at > ?3",
                params![chat_id.to_string(), viewer.to_string(), fmt_ts(since)],
                |row| row.get(0),
            )?,
            None => self.conn().query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE chat_id = ?1 AND sender_id != ?2 AND deleted_at IS NULL",
                params![chat_id.to_string(), viewer.to_string()],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind_str: String = row.get(3)?;
    let kind = MessageKind::from_str(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id: MessageId(col_uuid(row, 0)?),
        chat_id: ChatId(col_uuid(row, 1)?),
        sender_id: UserId(col_uuid(row, 2)?),
        kind,
        content: row.get(4)?,
        seq: row.get(5)?,
        created_at: col_ts(row, 6)?,
        deleted_by: col_opt_uuid(row, 7)?.map(UserId),
        deleted_at: col_opt_ts(row, 8)?,
    })
}
