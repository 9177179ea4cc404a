//! v001 -- Initial schema creation.
//!
//! Creates the five messaging tables: `direct_chats`, `chat_groups`,
//! `group_members`, `messages` and `group_messages`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Direct chats (one row per unordered participant pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS direct_chats (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_a INTEGER NOT NULL,
    participant_b INTEGER NOT NULL,
    created_at    TEXT NOT NULL                  -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_direct_chats_a ON direct_chats(participant_a);
CREATE INDEX IF NOT EXISTS idx_direct_chats_b ON direct_chats(participant_b);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_groups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    creator_id  INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Group memberships
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_members (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id   INTEGER NOT NULL,
    member_id  INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_group_members_pair
    ON group_members(group_id, member_id);
CREATE INDEX IF NOT EXISTS idx_group_members_member ON group_members(member_id);

-- ----------------------------------------------------------------
-- Messages (conversation_id names a direct chat or a group per kind)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL,
    sender_id       INTEGER NOT NULL,
    kind            TEXT NOT NULL CHECK (kind IN ('direct', 'group')),
    content         TEXT NOT NULL,
    is_read         TEXT NOT NULL DEFAULT 'false',  -- 'true' / 'false'
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(kind, conversation_id);

-- ----------------------------------------------------------------
-- Group message links
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id   INTEGER NOT NULL,
    message_id INTEGER NOT NULL,

    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_messages_group ON group_messages(group_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
