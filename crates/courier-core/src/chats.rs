//! Direct chat lifecycle.

use std::sync::Arc;

use tracing::info;

use courier_store::{DirectChat, DirectChatFilter, Repository};

use crate::access::AccessControl;
use crate::error::{CoreError, Result};
use crate::types::{storable_id, Conversation, Principal};

#[derive(Clone)]
pub struct DirectChats {
    repo: Arc<dyn Repository>,
    access: AccessControl,
}

impl DirectChats {
    pub fn new(repo: Arc<dyn Repository>, access: AccessControl) -> Self {
        Self { repo, access }
    }

    /// Open a chat between `principal` and `other`.
    ///
    /// If any chat already links the two, in either order, nothing is
    /// written and [`CoreError::Conflict`] is returned. Two concurrent calls
    /// for the same pair can both pass the check.
    pub fn open(&self, principal: Principal, other: u64) -> Result<DirectChat> {
        storable_id(principal.id(), "user")?;
        storable_id(other, "user")?;
        if other == principal.id() {
            return Err(CoreError::InvalidInput(
                "can not open a chat with yourself".into(),
            ));
        }

        if let Some(existing) = self.find_pair(principal.id(), other)? {
            info!(%principal, other, chat_id = existing.id, "chat already exists");
            return Err(CoreError::Conflict("this chat already exists".into()));
        }

        let chat = self.repo.create_direct_chat(principal.id(), other)?;
        info!(%principal, other, chat_id = chat.id, "chat created");
        Ok(chat)
    }

    /// Fetch a chat the principal participates in.
    pub fn get(&self, principal: Principal, chat_id: u64) -> Result<DirectChat> {
        self.access
            .require_participant(principal, Conversation::direct(chat_id))?;

        self.repo
            .find_direct_chats(&DirectChatFilter::by_id(chat_id))?
            .pop()
            .ok_or_else(|| CoreError::NotFound(format!("chat {chat_id}")))
    }

    /// Delete a chat and its messages. Either participant may do this.
    pub fn delete(&self, principal: Principal, chat_id: u64) -> Result<()> {
        self.access
            .require_participant(principal, Conversation::direct(chat_id))?;

        if !self.repo.delete_direct_chat(chat_id)? {
            return Err(CoreError::NotFound(format!("chat {chat_id}")));
        }
        info!(%principal, chat_id, "chat deleted");
        Ok(())
    }

    fn find_pair(&self, a: u64, b: u64) -> Result<Option<DirectChat>> {
        if let Some(chat) = self.repo.find_direct_chats(&DirectChatFilter::pair(a, b))?.pop() {
            return Ok(Some(chat));
        }
        Ok(self.repo.find_direct_chats(&DirectChatFilter::pair(b, a))?.pop())
    }
}
