use std::fmt;

use serde::{Deserialize, Serialize};

use courier_store::ConversationKind;

use crate::error::{CoreError, Result};

/// Largest identifier storage can hold.
pub const MAX_ID: u64 = i64::MAX as u64;

/// `id` unchanged if storage can hold it; a client error naming `what`
/// otherwise.
pub fn storable_id(id: u64, what: &str) -> Result<u64> {
    if id > MAX_ID {
        return Err(CoreError::InvalidInput(format!("{what} id {id} is out of range")));
    }
    Ok(id)
}

/// The authenticated actor behind a request or a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(pub u64);

impl Principal {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A direct chat or a group, referenced by kind + id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conversation {
    pub kind: ConversationKind,
    pub id: u64,
}

impl Conversation {
    pub fn direct(id: u64) -> Self {
        Self {
            kind: ConversationKind::Direct,
            id,
        }
    }

    pub fn group(id: u64) -> Self {
        Self {
            kind: ConversationKind::Group,
            id,
        }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
