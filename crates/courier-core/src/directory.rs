//! Conversation directory: everything a principal takes part in, with
//! unread counts.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use courier_store::{DirectChat, DirectChatFilter, Group, GroupFilter, MembershipFilter, Repository};

use crate::error::Result;
use crate::ledger::MessageLedger;
use crate::types::{Conversation, Principal};

/// One directory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversationEntry {
    Direct(DirectChat),
    Group(Group),
}

impl ConversationEntry {
    pub fn conversation(&self) -> Conversation {
        match self {
            ConversationEntry::Direct(chat) => Conversation::direct(chat.id),
            ConversationEntry::Group(group) => Conversation::group(group.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub entry: ConversationEntry,
    pub unread: usize,
}

#[derive(Clone)]
pub struct Directory {
    repo: Arc<dyn Repository>,
    ledger: MessageLedger,
}

impl Directory {
    pub fn new(repo: Arc<dyn Repository>, ledger: MessageLedger) -> Self {
        Self { repo, ledger }
    }

    /// Direct chats (either side) followed by groups, each with its unread
    /// count. An empty list means "no conversations", not a failure.
    pub fn list_conversations(&self, principal: Principal) -> Result<Vec<ConversationSummary>> {
        let mut entries: Vec<ConversationEntry> = self
            .direct_chats_of(principal)?
            .into_iter()
            .map(ConversationEntry::Direct)
            .collect();
        entries.extend(self.groups_of(principal)?.into_iter().map(ConversationEntry::Group));

        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let unread = self.ledger.unread_count(entry.conversation())?;
            summaries.push(ConversationSummary { entry, unread });
        }

        debug!(%principal, conversations = summaries.len(), "listed conversations");
        Ok(summaries)
    }

    /// Chats opened by `principal` unioned with chats opened with them.
    /// Deduplicated by id, first occurrence wins.
    fn direct_chats_of(&self, principal: Principal) -> Result<Vec<DirectChat>> {
        let opened = self.repo.find_direct_chats(&DirectChatFilter {
            participant_a: Some(principal.id()),
            ..Default::default()
        })?;
        let received = self.repo.find_direct_chats(&DirectChatFilter {
            participant_b: Some(principal.id()),
            ..Default::default()
        })?;

        let mut seen = HashSet::new();
        Ok(opened
            .into_iter()
            .chain(received)
            .filter(|chat| seen.insert(chat.id))
            .collect())
    }

    /// Groups `principal` is a member of, in join order.
    pub fn groups_of(&self, principal: Principal) -> Result<Vec<Group>> {
        let memberships = self
            .repo
            .find_memberships(&MembershipFilter::of_member(principal.id()))?;

        let mut seen = HashSet::new();
        let mut groups = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if !seen.insert(membership.group_id) {
                continue;
            }
            // A group deleted between the two reads simply drops out.
            groups.extend(self.repo.find_groups(&GroupFilter::by_id(membership.group_id))?);
        }
        Ok(groups)
    }
}
