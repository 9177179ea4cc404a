//! CRUD operations for [`DirectChat`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::{id_column, sql_id, stored_id, timestamp_column, timestamp_to_sql, Database};
use crate::error::Result;
use crate::filters::{DirectChatFilter, ToWhere};
use crate::models::{ConversationKind, DirectChat};

impl Database {
    /// Insert a new direct chat between `participant_a` and `participant_b`.
    ///
    /// No uniqueness check happens here; callers look for an existing pair
    /// first.
    pub fn insert_direct_chat(&self, participant_a: u64, participant_b: u64) -> Result<DirectChat> {
        let (a, b) = (stored_id(participant_a)?, stored_id(participant_b)?);
        let created_at = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO direct_chats (participant_a, participant_b, created_at)
             VALUES (?1, ?2, ?3)",
            params![a, b, timestamp_to_sql(&created_at)],
        )?;

        Ok(DirectChat {
            id: conn.last_insert_rowid() as u64,
            participant_a,
            participant_b,
            created_at,
        })
    }

    /// All direct chats matching `filter`, oldest first.
    pub fn select_direct_chats(&self, filter: &DirectChatFilter) -> Result<Vec<DirectChat>> {
        let clause = filter.to_where();
        let sql = format!(
            "SELECT id, participant_a, participant_b, created_at
             FROM direct_chats{}
             ORDER BY id ASC",
            clause.sql()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(clause.params(), row_to_direct_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Delete a direct chat together with its messages in one transaction.
    /// Returns `true` if the chat existed.
    pub fn remove_direct_chat(&self, id: u64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM messages WHERE kind = ?1 AND conversation_id = ?2",
            params![ConversationKind::Direct.as_str(), sql_id(id)],
        )?;
        let affected = tx.execute("DELETE FROM direct_chats WHERE id = ?1", params![sql_id(id)])?;

        tx.commit()?;
        Ok(affected > 0)
    }
}

fn row_to_direct_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectChat> {
    Ok(DirectChat {
        id: id_column(row, 0)?,
        participant_a: id_column(row, 1)?,
        participant_b: id_column(row, 2)?,
        created_at: timestamp_column(row, 3)?,
    })
}
