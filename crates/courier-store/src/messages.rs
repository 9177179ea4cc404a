//! CRUD operations for [`Message`] records.
//!
//! Group messages carry a [`GroupMessageLink`](crate::GroupMessageLink) row;
//! inserts and deletes keep the two in step inside one transaction.

use rusqlite::params;

use crate::database::{id_column, sql_id, stored_id, timestamp_column, timestamp_to_sql, Database};
use crate::error::Result;
use crate::filters::{MessageFilter, ToWhere};
use crate::models::{read_flag_to_sql, ConversationKind, Message, NewMessage};

impl Database {
    /// Insert an unread message. For group messages the link row is written
    /// in the same transaction, so either both rows exist or neither does.
    pub fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let conversation_id = stored_id(message.conversation_id)?;
        let sender_id = stored_id(message.sender_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO messages (conversation_id, sender_id, kind, content, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                conversation_id,
                sender_id,
                message.kind.as_str(),
                message.content,
                read_flag_to_sql(false),
                timestamp_to_sql(&message.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();

        if message.kind == ConversationKind::Group {
            tx.execute(
                "INSERT INTO group_messages (group_id, message_id) VALUES (?1, ?2)",
                params![conversation_id, id],
            )?;
        }

        tx.commit()?;

        Ok(Message {
            id: id as u64,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            kind: message.kind,
            content: message.content.clone(),
            is_read: false,
            created_at: message.created_at,
        })
    }

    /// All messages matching `filter`, in insertion order.
    pub fn select_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>> {
        let clause = filter.to_where();
        let sql = format!(
            "SELECT id, conversation_id, sender_id, kind, content, is_read, created_at
             FROM messages{}
             ORDER BY id ASC",
            clause.sql()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(clause.params(), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Count messages matching `filter` without loading them.
    pub fn select_message_count(&self, filter: &MessageFilter) -> Result<usize> {
        let clause = filter.to_where();
        let sql = format!("SELECT COUNT(*) FROM messages{}", clause.sql());
        let count: i64 = self
            .conn()?
            .query_row(&sql, clause.params(), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Flip the read flag of the given messages to `"true"`. Already-read
    /// messages are left untouched. Returns the number of rows changed.
    pub fn set_messages_read(&self, ids: &[u64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE messages SET is_read = ?1 WHERE id = ?2 AND is_read = ?3",
            )?;
            for id in ids {
                changed += stmt.execute(params![
                    read_flag_to_sql(true),
                    sql_id(*id),
                    read_flag_to_sql(false)
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Delete every message matching `filter` along with any group links
    /// pointing at them. Returns the number of messages removed.
    pub fn remove_messages(&self, filter: &MessageFilter) -> Result<usize> {
        let clause = filter.to_where();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "DELETE FROM group_messages
                 WHERE message_id IN (SELECT id FROM messages{})",
                clause.sql()
            ),
            clause.params(),
        )?;
        let affected = tx.execute(
            &format!("DELETE FROM messages{}", clause.sql()),
            clause.params(),
        )?;

        tx.commit()?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind_str: String = row.get(3)?;
    let kind = kind_str.parse::<ConversationKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    let read_str: String = row.get(5)?;

    Ok(Message {
        id: id_column(row, 0)?,
        conversation_id: id_column(row, 1)?,
        sender_id: id_column(row, 2)?,
        kind,
        content: row.get(4)?,
        is_read: read_str == "true",
        created_at: timestamp_column(row, 6)?,
    })
}
