//! Sparse query filters.
//!
//! Each filter is an AND of whichever fields are set: an unset field is a
//! wildcard, a set field is an equality test. `Default::default()` therefore
//! matches every row.

use rusqlite::types::Value;

use crate::database::sql_id;
use crate::models::{read_flag_to_sql, ConversationKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectChatFilter {
    pub id: Option<u64>,
    pub participant_a: Option<u64>,
    pub participant_b: Option<u64>,
}

impl DirectChatFilter {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Chats opened by `a` with `b` (one direction only).
    pub fn pair(a: u64, b: u64) -> Self {
        Self {
            participant_a: Some(a),
            participant_b: Some(b),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub creator_id: Option<u64>,
}

impl GroupFilter {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipFilter {
    pub id: Option<u64>,
    pub group_id: Option<u64>,
    pub member_id: Option<u64>,
}

impl MembershipFilter {
    pub fn of_group(group_id: u64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn of_member(member_id: u64) -> Self {
        Self {
            member_id: Some(member_id),
            ..Self::default()
        }
    }

    pub fn pair(group_id: u64, member_id: u64) -> Self {
        Self {
            group_id: Some(group_id),
            member_id: Some(member_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMessageFilter {
    pub id: Option<u64>,
    pub group_id: Option<u64>,
    pub message_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub id: Option<u64>,
    pub conversation_id: Option<u64>,
    pub sender_id: Option<u64>,
    pub kind: Option<ConversationKind>,
    pub is_read: Option<bool>,
}

impl MessageFilter {
    /// Every message of one conversation.
    pub fn conversation(kind: ConversationKind, conversation_id: u64) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn unread(mut self) -> Self {
        self.is_read = Some(false);
        self
    }
}

// ---------------------------------------------------------------------------
// SQL rendering
// ---------------------------------------------------------------------------

/// A `WHERE` clause built from the set fields of a filter, with positional
/// parameters in declaration order.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    terms: Vec<String>,
    values: Vec<Value>,
}

impl WhereClause {
    fn id(mut self, column: &str, value: Option<u64>) -> Self {
        if let Some(v) = value {
            self.push(column, Value::Integer(sql_id(v)));
        }
        self
    }

    fn text(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.push(column, Value::Text(v.to_string()));
        }
        self
    }

    fn push(&mut self, column: &str, value: Value) {
        self.values.push(value);
        self.terms.push(format!("{column} = ?{}", self.values.len()));
    }

    /// `""` when nothing is set, otherwise ` WHERE a = ?1 AND b = ?2 ...`.
    pub(crate) fn sql(&self) -> String {
        if self.terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.terms.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.values.iter())
    }
}

pub(crate) trait ToWhere {
    fn to_where(&self) -> WhereClause;
}

impl ToWhere for DirectChatFilter {
    fn to_where(&self) -> WhereClause {
        WhereClause::default()
            .id("id", self.id)
            .id("participant_a", self.participant_a)
            .id("participant_b", self.participant_b)
    }
}

impl ToWhere for GroupFilter {
    fn to_where(&self) -> WhereClause {
        WhereClause::default()
            .id("id", self.id)
            .text("name", self.name.as_deref())
            .id("creator_id", self.creator_id)
    }
}

impl ToWhere for MembershipFilter {
    fn to_where(&self) -> WhereClause {
        WhereClause::default()
            .id("id", self.id)
            .id("group_id", self.group_id)
            .id("member_id", self.member_id)
    }
}

impl ToWhere for GroupMessageFilter {
    fn to_where(&self) -> WhereClause {
        WhereClause::default()
            .id("id", self.id)
            .id("group_id", self.group_id)
            .id("message_id", self.message_id)
    }
}

impl ToWhere for MessageFilter {
    fn to_where(&self) -> WhereClause {
        WhereClause::default()
            .id("id", self.id)
            .id("conversation_id", self.conversation_id)
            .id("sender_id", self.sender_id)
            .text("kind", self.kind.as_ref().map(ConversationKind::as_str))
            .text("is_read", self.is_read.map(read_flag_to_sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_a_wildcard() {
        let clause = MessageFilter::default().to_where();
        assert_eq!(clause.sql(), "");
    }

    #[test]
    fn set_fields_become_numbered_equalities() {
        let clause = MessageFilter::conversation(ConversationKind::Group, 3)
            .unread()
            .to_where();
        assert_eq!(
            clause.sql(),
            " WHERE conversation_id = ?1 AND kind = ?2 AND is_read = ?3"
        );
        assert_eq!(
            clause.values,
            vec![
                Value::Integer(3),
                Value::Text("group".into()),
                Value::Text("false".into()),
            ]
        );
    }

    #[test]
    fn pair_filter_sets_both_participants() {
        let clause = DirectChatFilter::pair(1, 2).to_where();
        assert_eq!(clause.sql(), " WHERE participant_a = ?1 AND participant_b = ?2");
    }
}
