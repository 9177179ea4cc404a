use courier_store::StoreError;
use thiserror::Error;

use crate::types::Conversation;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed identifier or empty required field. Nothing was written.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The conversation exists but the principal may not act on it.
    /// Reported to callers exactly like [`CoreError::NotFound`].
    #[error("Access denied to {conversation}")]
    AccessDenied { conversation: Conversation },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Informational: the thing being created already exists.
    #[error("{0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Storage(StoreError),

    /// The streaming peer went away abnormally or a push failed.
    #[error("Stream failure: {0}")]
    Stream(String),
}

impl CoreError {
    /// `true` for the two errors that leave the boundary as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::AccessDenied { .. } | CoreError::NotFound(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IdOutOfRange(id) => {
                CoreError::InvalidInput(format!("identifier {id} is out of range"))
            }
            other => CoreError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
