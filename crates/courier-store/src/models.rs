//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! straight to the HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conversation kind
// ---------------------------------------------------------------------------

/// Which identifier space a conversation id (and a message's
/// `conversation_id`) lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConversationKind::Direct),
            "group" => Ok(ConversationKind::Group),
            other => Err(format!("unknown conversation kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Direct chat
// ---------------------------------------------------------------------------

/// A two-party conversation. Undirected: either participant may act on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectChat {
    pub id: u64,
    /// The principal that opened the chat.
    pub participant_a: u64,
    /// The principal it was opened with.
    pub participant_b: u64,
    pub created_at: DateTime<Utc>,
}

impl DirectChat {
    /// Returns `true` if `principal` is either participant.
    pub fn involves(&self, principal: u64) -> bool {
        self.participant_a == principal || self.participant_b == principal
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named multi-member conversation with a distinguished creator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub creator_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`Group`]; ids and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub creator_id: u64,
}

/// Join row between a group and one of its members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMembership {
    pub id: u64,
    pub group_id: u64,
    pub member_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Records that a group message belongs to a group, for deletion fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMessageLink {
    pub id: u64,
    pub group_id: u64,
    pub message_id: u64,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.
///
/// `conversation_id` is a direct chat id when `kind` is `Direct` and a group
/// id when `kind` is `Group`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub conversation_id: u64,
    pub sender_id: u64,
    pub kind: ConversationKind,
    pub content: String,
    /// Stored as the text `"true"` / `"false"`.
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`Message`]. New messages are always unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: u64,
    pub sender_id: u64,
    pub kind: ConversationKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn read_flag_to_sql(is_read: bool) -> &'static str {
    if is_read {
        "true"
    } else {
        "false"
    }
}
