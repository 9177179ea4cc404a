//! CRUD operations for [`Group`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::{id_column, sql_id, stored_id, timestamp_column, timestamp_to_sql, Database};
use crate::error::Result;
use crate::filters::{GroupFilter, ToWhere};
use crate::models::{ConversationKind, Group, NewGroup};

impl Database {
    /// Insert a group and its creator's membership in one transaction.
    pub fn insert_group(&self, group: &NewGroup) -> Result<Group> {
        let creator = stored_id(group.creator_id)?;
        let created_at = Utc::now();
        let created_sql = timestamp_to_sql(&created_at);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO chat_groups (name, description, creator_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                group.name,
                group.description,
                creator,
                created_sql
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO group_members (group_id, member_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![id, creator, created_sql],
        )?;

        tx.commit()?;

        Ok(Group {
            id: id as u64,
            name: group.name.clone(),
            description: group.description.clone(),
            creator_id: group.creator_id,
            created_at,
        })
    }

    /// All groups matching `filter`, oldest first.
    pub fn select_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        let clause = filter.to_where();
        let sql = format!(
            "SELECT id, name, description, creator_id, created_at
             FROM chat_groups{}
             ORDER BY id ASC",
            clause.sql()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(clause.params(), row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// Delete a group and everything hanging off it (memberships, message
    /// links and the group's messages) in one transaction. Returns `true` if
    /// the group existed.
    pub fn remove_group(&self, id: u64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM group_messages WHERE group_id = ?1",
            params![sql_id(id)],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE kind = ?1 AND conversation_id = ?2",
            params![ConversationKind::Group.as_str(), sql_id(id)],
        )?;
        tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1",
            params![sql_id(id)],
        )?;
        let affected = tx.execute("DELETE FROM chat_groups WHERE id = ?1", params![sql_id(id)])?;

        tx.commit()?;
        Ok(affected > 0)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        creator_id: id_column(row, 3)?,
        created_at: timestamp_column(row, 4)?,
    })
}
