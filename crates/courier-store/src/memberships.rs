//! CRUD operations for [`GroupMembership`] and [`GroupMessageLink`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::{id_column, stored_id, timestamp_column, timestamp_to_sql, Database};
use crate::error::{Result, StoreError};
use crate::filters::{GroupMessageFilter, MembershipFilter, ToWhere};
use crate::models::{GroupMembership, GroupMessageLink};

impl Database {
    /// Add `member_id` to `group_id`.
    ///
    /// The `(group_id, member_id)` pair is unique; inserting it twice yields
    /// [`StoreError::Duplicate`].
    pub fn insert_membership(&self, group_id: u64, member_id: u64) -> Result<GroupMembership> {
        let (group, member) = (stored_id(group_id)?, stored_id(member_id)?);
        let created_at = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO group_members (group_id, member_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![group, member, timestamp_to_sql(&created_at)],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                StoreError::Duplicate
            }
            other => StoreError::Sqlite(other),
        })?;

        Ok(GroupMembership {
            id: conn.last_insert_rowid() as u64,
            group_id,
            member_id,
            created_at,
        })
    }

    pub fn select_memberships(&self, filter: &MembershipFilter) -> Result<Vec<GroupMembership>> {
        let clause = filter.to_where();
        let sql = format!(
            "SELECT id, group_id, member_id, created_at
             FROM group_members{}
             ORDER BY id ASC",
            clause.sql()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(clause.params(), |row| {
            Ok(GroupMembership {
                id: id_column(row, 0)?,
                group_id: id_column(row, 1)?,
                member_id: id_column(row, 2)?,
                created_at: timestamp_column(row, 3)?,
            })
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?);
        }
        Ok(memberships)
    }

    /// Delete every membership matching `filter`. Returns the number removed.
    pub fn remove_memberships(&self, filter: &MembershipFilter) -> Result<usize> {
        let clause = filter.to_where();
        let sql = format!("DELETE FROM group_members{}", clause.sql());
        let affected = self.conn()?.execute(&sql, clause.params())?;
        Ok(affected)
    }

    pub fn select_group_message_links(
        &self,
        filter: &GroupMessageFilter,
    ) -> Result<Vec<GroupMessageLink>> {
        let clause = filter.to_where();
        let sql = format!(
            "SELECT id, group_id, message_id FROM group_messages{} ORDER BY id ASC",
            clause.sql()
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(clause.params(), |row| {
            Ok(GroupMessageLink {
                id: id_column(row, 0)?,
                group_id: id_column(row, 1)?,
                message_id: id_column(row, 2)?,
            })
        })?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }
}
