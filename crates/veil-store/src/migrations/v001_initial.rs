//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `chats`, `messages`, `read_state`, and
//! `profiles`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    pair_key            TEXT NOT NULL UNIQUE,       -- "min_uuid|max_uuid" of the pair
    participant_a       TEXT NOT NULL,              -- UUID
    participant_b       TEXT NOT NULL,              -- UUID
    alias_a             TEXT NOT NULL,
    alias_b             TEXT NOT NULL,
    state               TEXT NOT NULL DEFAULT 'anonymous',
    message_count       INTEGER NOT NULL DEFAULT 0,
    reveal_requested_by TEXT,                       -- UUID, only while reveal_pending
    reveal_requested_at TEXT,                       -- ISO-8601 / RFC-3339
    revealed_at         TEXT,                       -- set once, on entering 'normal'
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    last_activity_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_participant_a ON chats(participant_a);
CREATE INDEX IF NOT EXISTS idx_chats_participant_b ON chats(participant_b);
CREATE INDEX IF NOT EXISTS idx_chats_activity
    ON chats(last_activity_at DESC, id DESC);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,           -- UUID v4
    chat_id    TEXT NOT NULL,                       -- FK -> chats(id)
    sender_id  TEXT NOT NULL,                       -- UUID
    kind       TEXT NOT NULL DEFAULT 'text',
    content    TEXT NOT NULL,
    seq        INTEGER NOT NULL,                    -- per-chat, 1-based
    created_at TEXT NOT NULL,
    deleted_by TEXT,                                -- UUID of the deleting sender
    deleted_at TEXT,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_chat_seq
    ON messages(chat_id, seq);
CREATE INDEX IF NOT EXISTS idx_messages_chat_created
    ON messages(chat_id, created_at);

-- ----------------------------------------------------------------
-- Read state
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS read_state (
    chat_id      TEXT NOT NULL,                     -- FK -> chats(id)
    user_id      TEXT NOT NULL,                     -- UUID
    last_read_at TEXT NOT NULL,

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Profiles (identity cache, read only after reveal)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id      TEXT PRIMARY KEY NOT NULL,         -- UUID
    display_name TEXT,
    avatar_url   TEXT,
    updated_at   TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
