//! Identity cache CRUD.
//!
//! The platform's identity service is the source of truth for real names
//! and avatars; this table is the engine's local copy, written by whatever
//! sync path the deployment wires up. Reads happen only behind the
//! post-reveal masking boundary.

use chrono::{DateTime, Utc};
use rusqlite::params;

use veil_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Profile;
use crate::util::{col_ts, col_uuid, fmt_ts};

impl Database {
    pub fn upsert_profile(
        &self,
        user: UserId,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (user_id, display_name, avatar_url, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE
             SET display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url,
                 updated_at = excluded.updated_at",
            params![user.to_string(), display_name, avatar_url, fmt_ts(at)],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user: UserId) -> Result<Option<Profile>> {
        let result = self.conn().query_row(
            "SELECT user_id, display_name, avatar_url, updated_at
             FROM profiles WHERE user_id = ?1",
            params![user.to_string()],
            row_to_profile,
        );
        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(StoreError::Sqlite(other)),
        }
    }
}

/// Map a `rusqlite::Row` to a [`Profile`].
fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: UserId(col_uuid(row, 0)?),
        display_name: row.get(1)?,
        avatar_url: row.get(2)?,
        updated_at: col_ts(row, 3)?,
    })
}
