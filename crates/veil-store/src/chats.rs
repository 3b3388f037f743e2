//! CRUD and state-transition operations for [`Chat`] records.
//!
//! The three reveal transitions are compare-and-swap updates conditioned on
//! the current state. They return `false` when the chat was not in the
//! expected state, which is how a lost race surfaces to the engine.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::str::FromStr;

use veil_shared::types::{ChatId, ChatState, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Chat;
use crate::util::{col_opt_ts, col_opt_uuid, col_ts, col_uuid, fmt_ts};

const CHAT_COLUMNS: &str = "id, pair_key, participant_a, participant_b, alias_a, alias_b, \
     state, message_count, reveal_requested_by, reveal_requested_at, revealed_at, \
     created_at, updated_at, last_activity_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chat. Fails on a `pair_key` collision, which callers
    /// resolve by re-reading the existing chat for that pair.
    pub fn insert_chat(&self, chat: &Chat) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chats (id, pair_key, participant_a, participant_b, alias_a, alias_b,
                                state, message_count, reveal_requested_by, reveal_requested_at,
                                revealed_at, created_at, updated_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                chat.id.to_string(),
                chat.pair_key,
                chat.participant_a.to_string(),
                chat.participant_b.to_string(),
                chat.alias_a,
                chat.alias_b,
                chat.state.as_str(),
                chat.message_count,
                chat.reveal_requested_by.map(|u| u.to_string()),
                chat.reveal_requested_at.map(fmt_ts),
                chat.revealed_at.map(fmt_ts),
                fmt_ts(chat.created_at),
                fmt_ts(chat.updated_at),
                fmt_ts(chat.last_activity_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat by id.
    pub fn get_chat(&self, id: ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![id.to_string()],
                row_to_chat,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch the chat for a canonical participant pair key, if one exists.
    pub fn get_chat_by_pair(&self, pair_key: &str) -> Result<Option<Chat>> {
        let result = self.conn().query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE pair_key = ?1"),
            params![pair_key],
            row_to_chat,
        );
        match result {
            Ok(chat) => Ok(Some(chat)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }

    /// List a user's chats, most recent activity first, resuming after the
    /// `(last_activity_at, id)` position of the previous page's final entry.
    pub fn list_chats_for_user(
        &self,
        user: UserId,
        before: Option<(DateTime<Utc>, ChatId)>,
        limit: u32,
    ) -> Result<Vec<Chat>> {
        let user = user.to_string();
        let mut chats = Vec::new();

        match before {
            Some((activity, id)) => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {CHAT_COLUMNS} FROM chats
                     WHERE (participant_a = ?1 OR participant_b = ?1)
                       AND (last_activity_at < ?2
                            OR (last_activity_at = ?2 AND id < ?3))
                     ORDER BY last_activity_at DESC, id DESC
                     LIMIT ?4"
                ))?;
                let rows = stmt.query_map(
                    params![user, fmt_ts(activity), id.to_string(), limit],
                    row_to_chat,
                )?;
                for row in rows {
                    chats.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {CHAT_COLUMNS} FROM chats
                     WHERE participant_a = ?1 OR participant_b = ?1
                     ORDER BY last_activity_at DESC, id DESC
                     LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![user, limit], row_to_chat)?;
                for row in rows {
                    chats.push(row?);
                }
            }
        }

        Ok(chats)
    }

    // ------------------------------------------------------------------
    // Reveal transitions (compare-and-swap on `state`)
    // ------------------------------------------------------------------

    /// `anonymous -> reveal_pending`. Returns `false` if the chat was not
    /// in `anonymous` when the update ran.
    pub fn begin_reveal(
        &self,
        id: ChatId,
        requester: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats
             SET state = ?1, reveal_requested_by = ?2, reveal_requested_at = ?3, updated_at = ?3
             WHERE id = ?4 AND state = ?5",
            params![
                ChatState::RevealPending.as_str(),
                requester.to_string(),
                fmt_ts(at),
                id.to_string(),
                ChatState::Anonymous.as_str(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// `reveal_pending -> normal`. Sets `revealed_at` and clears the
    /// pending-request fields. Returns `false` on a lost race.
    pub fn complete_reveal(&self, id: ChatId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats
             SET state = ?1, revealed_at = ?2, updated_at = ?2,
                 reveal_requested_by = NULL, reveal_requested_at = NULL
             WHERE id = ?3 AND state = ?4",
            params![
                ChatState::Normal.as_str(),
                fmt_ts(at),
                id.to_string(),
                ChatState::RevealPending.as_str(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// `reveal_pending -> anonymous` (decline). Clears the pending-request
    /// fields. Returns `false` on a lost race.
    pub fn cancel_reveal(&self, id: ChatId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats
             SET state = ?1, updated_at = ?2,
                 reveal_requested_by = NULL, reveal_requested_at = NULL
             WHERE id = ?3 AND state = ?4",
            params![
                ChatState::Anonymous.as_str(),
                fmt_ts(at),
                id.to_string(),
                ChatState::RevealPending.as_str(),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Counters & activity
    // ------------------------------------------------------------------

    /// Increment the reveal-eligibility counter and bump activity.
    /// The counter is a ratchet: nothing ever decrements it.
    pub fn bump_message_count(&self, id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE chats
             SET message_count = message_count + 1, updated_at = ?1, last_activity_at = ?1
             WHERE id = ?2",
            params![fmt_ts(at), id.to_string()],
        )?;
        Ok(())
    }

    /// Bump activity timestamps without touching the counter (synthetic
    /// messages keep the inbox fresh but never count toward reveal).
    pub fn touch_chat_activity(&self, id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE chats SET updated_at = ?1, last_activity_at = ?1 WHERE id = ?2",
            params![fmt_ts(at), id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let state_str: String = row.get(6)?;
    let state = ChatState::from_str(&state_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Chat {
        id: ChatId(col_uuid(row, 0)?),
        pair_key: row.get(1)?,
        participant_a: UserId(col_uuid(row, 2)?),
        participant_b: UserId(col_uuid(row, 3)?),
        alias_a: row.get(4)?,
        alias_b: row.get(5)?,
        state,
        message_count: row.get(7)?,
        reveal_requested_by: col_opt_uuid(row, 8)?.map(UserId),
        reveal_requested_at: col_opt_ts(row, 9)?,
        revealed_at: col_opt_ts(row, 10)?,
        created_at: col_ts(row, 11)?,
        updated_at: col_ts(row, 12)?,
        last_activity_at: col_ts(row, 13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_shared::types::pair_key;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn new_chat(a: UserId, b: UserId) -> Chat {
        let now = Utc::now();
        Chat {
            id: ChatId::new(),
            pair_key: pair_key(a, b),
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
    fn insert_and_get() {
        let (db, _dir) = test_db();
        let chat = new_chat(UserId::new(), UserId::new());
        db.insert_chat(&chat).unwrap();

        let loaded = db.get_chat(chat.id).unwrap();
        assert_eq!(loaded.pair_key, chat.pair_key);
        assert_eq!(loaded.state, ChatState::Anonymous);
        assert_eq!(loaded.message_count, 0);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (db, _dir) = test_db();
        assert!(matches!(db.get_chat(ChatId::new()), Err(StoreError::NotFound)));
    }

    #[test]
    fn pair_key_is_unique() {
        let (db, _dir) = test_db();
        let a = UserId::new();
        let b = UserId::new();
        db.insert_chat(&new_chat(a, b)).unwrap();
        assert!(db.insert_chat(&new_chat(a, b)).is_err());
    }

    #[test]
    fn lookup_by_pair() {
        let (db, _dir) = test_db();
        let a = UserId::new();
        let b = UserId::new();
        let chat = new_chat(a, b);
        db.insert_chat(&chat).unwrap();

        let found = db.get_chat_by_pair(&pair_key(b, a)).unwrap();
        assert_eq!(found.map(|c| c.id), Some(chat.id));
        assert!(db.get_chat_by_pair("x|y").unwrap().is_none());
    }

    #[test]
    fn reveal_transitions_are_cas() {
        let (db, _dir) = test_db();
        let a = UserId::new();
        let chat = new_chat(a, UserId::new());
        db.insert_chat(&chat).unwrap();
        let now = Utc::now();

        // Accept before any request loses the CAS.
        assert!(!db.complete_reveal(chat.id, now).unwrap());

        assert!(db.begin_reveal(chat.id, a, now).unwrap());
        // Second request loses: no longer anonymous.
        assert!(!db.begin_reveal(chat.id, a, now).unwrap());

        let pending = db.get_chat(chat.id).unwrap();
        assert_eq!(pending.state, ChatState::RevealPending);
        assert_eq!(pending.reveal_requested_by, Some(a));
        assert!(pending.reveal_requested_at.is_some());

        assert!(db.complete_reveal(chat.id, now).unwrap());
        let normal = db.get_chat(chat.id).unwrap();
        assert_eq!(normal.state, ChatState::Normal);
        assert!(normal.revealed_at.is_some());
        assert_eq!(normal.reveal_requested_by, None);

        // Normal is terminal for both transition helpers.
        assert!(!db.complete_reveal(chat.id, now).unwrap());
        assert!(!db.cancel_reveal(chat.id, now).unwrap());
    }

    #[test]
    fn decline_returns_to_anonymous() {
        let (db, _dir) = test_db();
        let a = UserId::new();
        let chat = new_chat(a, UserId::new());
        db.insert_chat(&chat).unwrap();
        let now = Utc::now();

        assert!(db.begin_reveal(chat.id, a, now).unwrap());
        assert!(db.cancel_reveal(chat.id, now).unwrap());

        let back = db.get_chat(chat.id).unwrap();
        assert_eq!(back.state, ChatState::Anonymous);
        assert_eq!(back.reveal_requested_by, None);
        assert_eq!(back.reveal_requested_at, None);
        assert_eq!(back.revealed_at, None);

        // And the pair may request again.
        assert!(db.begin_reveal(chat.id, a, Utc::now()).unwrap());
    }

    #[test]
    fn list_orders_by_activity() {
        let (db, _dir) = test_db();
        let me = UserId::new();

        let old = new_chat(me, UserId::new());
        let recent = new_chat(me, UserId::new());
        db.insert_chat(&old).unwrap();
        db.insert_chat(&recent).unwrap();

        db.touch_chat_activity(recent.id, Utc::now() + chrono::Duration::seconds(5))
            .unwrap();

        let listed = db.list_chats_for_user(me, None, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, recent.id);
        assert_eq!(listed[1].id, old.id);

        // Resume after the first entry.
        let cursor = (listed[0].last_activity_at, listed[0].id);
        let rest = db.list_chats_for_user(me, Some(cursor), 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, old.id);
    }

    #[test]
    fn counter_only_moves_up() {
        let (db, _dir) = test_db();
        let chat = new_chat(UserId::new(), UserId::new());
        db.insert_chat(&chat).unwrap();

        db.bump_message_count(chat.id, Utc::now()).unwrap();
        db.bump_message_count(chat.id, Utc::now()).unwrap();
        assert_eq!(db.get_chat(chat.id).unwrap().message_count, 2);

        db.touch_chat_activity(chat.id, Utc::now()).unwrap();
        assert_eq!(db.get_chat(chat.id).unwrap().message_count, 2);
    }
}
