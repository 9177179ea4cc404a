//! Participation and creator checks.
//!
//! Two capabilities, checked separately:
//! - **member**: a participant of a direct chat, or a member of a group;
//!   required to send, delete or enumerate messages
//! - **creator**: the principal that created a group; required to delete
//!   the group and manage its membership
//!
//! Failures distinguish "does not exist" from "exists, not yours" so the two
//! can be traced, but both are reported outward as not found.

use std::sync::Arc;

use tracing::{debug, warn};

use courier_store::{
    ConversationKind, DirectChatFilter, Group, GroupFilter, MembershipFilter, Repository,
};

use crate::error::{CoreError, Result};
use crate::types::{Conversation, Principal};

#[derive(Clone)]
pub struct AccessControl {
    repo: Arc<dyn Repository>,
}

impl AccessControl {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Whether `principal` participates in `conversation`.
    pub fn is_participant(&self, principal: Principal, conversation: Conversation) -> Result<bool> {
        let participant = match conversation.kind {
            ConversationKind::Direct => self
                .repo
                .find_direct_chats(&DirectChatFilter::by_id(conversation.id))?
                .iter()
                .any(|chat| chat.involves(principal.id())),
            ConversationKind::Group => !self
                .repo
                .find_memberships(&MembershipFilter::pair(conversation.id, principal.id()))?
                .is_empty(),
        };
        Ok(participant)
    }

    /// Whether `principal` created group `group_id`.
    pub fn is_creator(&self, principal: Principal, group_id: u64) -> Result<bool> {
        Ok(self.creator_group(principal, group_id)?.is_some())
    }

    /// Gate for every conversation-scoped message operation.
    pub fn require_participant(&self, principal: Principal, conversation: Conversation) -> Result<()> {
        if self.is_participant(principal, conversation)? {
            debug!(%principal, %conversation, "participant check passed");
            return Ok(());
        }
        Err(self.deny(principal, conversation)?)
    }

    /// Gate for creator-only group operations. Returns the group on success.
    pub fn require_creator(&self, principal: Principal, group_id: u64) -> Result<Group> {
        if let Some(group) = self.creator_group(principal, group_id)? {
            return Ok(group);
        }
        Err(self.deny(principal, Conversation::group(group_id))?)
    }

    fn creator_group(&self, principal: Principal, group_id: u64) -> Result<Option<Group>> {
        let mut groups = self.repo.find_groups(&GroupFilter {
            id: Some(group_id),
            creator_id: Some(principal.id()),
            ..Default::default()
        })?;
        Ok(groups.pop())
    }

    fn exists(&self, conversation: Conversation) -> Result<bool> {
        let exists = match conversation.kind {
            ConversationKind::Direct => !self
                .repo
                .find_direct_chats(&DirectChatFilter::by_id(conversation.id))?
                .is_empty(),
            ConversationKind::Group => !self
                .repo
                .find_groups(&GroupFilter::by_id(conversation.id))?
                .is_empty(),
        };
        Ok(exists)
    }

    /// Build the rejection for a failed check, logging which case it was.
    fn deny(&self, principal: Principal, conversation: Conversation) -> Result<CoreError> {
        if self.exists(conversation)? {
            warn!(%principal, %conversation, "access denied");
            Ok(CoreError::AccessDenied { conversation })
        } else {
            debug!(%principal, %conversation, "conversation does not exist");
            Ok(CoreError::NotFound(format!("conversation {conversation}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_store::NewGroup;

    use super::*;
    use crate::testing::messaging;

    #[test]
    fn direct_chat_counts_both_participants() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);

        assert!(m.access.is_participant(Principal(1), conv).unwrap());
        assert!(m.access.is_participant(Principal(2), conv).unwrap());
        assert!(!m.access.is_participant(Principal(3), conv).unwrap());
    }

    #[test]
    fn group_membership_gates_participation() {
        let (m, db) = messaging();
        let group = db
            .create_group(&NewGroup {
                name: "g".into(),
                description: String::new(),
                creator_id: 9,
            })
            .unwrap();
        db.create_membership(group.id, 11).unwrap();
        let conv = Conversation::group(group.id);

        assert!(m.access.is_participant(Principal(9), conv).unwrap());
        assert!(m.access.is_participant(Principal(11), conv).unwrap());
        assert!(!m.access.is_participant(Principal(20), conv).unwrap());
    }

    #[test]
    fn creator_is_narrower_than_member() {
        let (m, db) = messaging();
        let group = db
            .create_group(&NewGroup {
                name: "g".into(),
                description: String::new(),
                creator_id: 9,
            })
            .unwrap();
        db.create_membership(group.id, 11).unwrap();

        assert!(m.access.is_creator(Principal(9), group.id).unwrap());
        assert!(!m.access.is_creator(Principal(11), group.id).unwrap());
        assert!(m.access.require_creator(Principal(9), group.id).is_ok());
        assert!(matches!(
            m.access.require_creator(Principal(11), group.id),
            Err(CoreError::AccessDenied { .. })
        ));
    }

    #[test]
    fn missing_and_foreign_conversations_are_distinguished_internally() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();

        let foreign = m
            .access
            .require_participant(Principal(3), Conversation::direct(chat.id))
            .unwrap_err();
        assert!(matches!(foreign, CoreError::AccessDenied { .. }));

        let missing = m
            .access
            .require_participant(Principal(3), Conversation::direct(chat.id + 100))
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));

        assert!(foreign.is_not_found() && missing.is_not_found());
    }

    #[test]
    fn kinds_do_not_share_id_spaces() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();

        assert!(!m
            .access
            .is_participant(Principal(1), Conversation::group(chat.id))
            .unwrap());
    }
}
