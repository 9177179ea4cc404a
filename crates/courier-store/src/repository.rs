//! The storage contract the messaging core is written against.
//!
//! Calls are synchronous and may block on I/O. Implementations own their
//! retry policy; the core never retries.

use crate::database::Database;
use crate::error::Result;
use crate::filters::{
    DirectChatFilter, GroupFilter, GroupMessageFilter, MembershipFilter, MessageFilter,
};
use crate::models::{
    DirectChat, Group, GroupMembership, GroupMessageLink, Message, NewGroup, NewMessage,
};

/// Filtered CRUD over direct chats, groups, memberships, group message
/// links and messages.
pub trait Repository: Send + Sync {
    // -- direct chats --

    fn create_direct_chat(&self, participant_a: u64, participant_b: u64) -> Result<DirectChat>;
    fn find_direct_chats(&self, filter: &DirectChatFilter) -> Result<Vec<DirectChat>>;
    /// Removes the chat and its messages.
    fn delete_direct_chat(&self, id: u64) -> Result<bool>;

    // -- groups --

    /// Creates the group and the creator's membership atomically.
    fn create_group(&self, group: &NewGroup) -> Result<Group>;
    fn find_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>>;
    /// Removes the group, its memberships, links and messages atomically.
    fn delete_group(&self, id: u64) -> Result<bool>;

    // -- memberships --

    fn create_membership(&self, group_id: u64, member_id: u64) -> Result<GroupMembership>;
    fn find_memberships(&self, filter: &MembershipFilter) -> Result<Vec<GroupMembership>>;
    fn delete_memberships(&self, filter: &MembershipFilter) -> Result<usize>;

    // -- group message links --

    fn find_group_message_links(&self, filter: &GroupMessageFilter)
        -> Result<Vec<GroupMessageLink>>;

    // -- messages --

    /// Group messages get their link row in the same atomic write.
    fn create_message(&self, message: &NewMessage) -> Result<Message>;
    /// Matching messages in insertion order.
    fn find_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>>;
    fn count_messages(&self, filter: &MessageFilter) -> Result<usize>;
    /// Sets the read flag on the given ids. Never clears it.
    fn mark_read(&self, ids: &[u64]) -> Result<usize>;
    /// Deletes matching messages and their group links atomically.
    fn delete_messages(&self, filter: &MessageFilter) -> Result<usize>;
}

impl Repository for Database {
    fn create_direct_chat(&self, participant_a: u64, participant_b: u64) -> Result<DirectChat> {
        self.insert_direct_chat(participant_a, participant_b)
    }

    fn find_direct_chats(&self, filter: &DirectChatFilter) -> Result<Vec<DirectChat>> {
        self.select_direct_chats(filter)
    }

    fn delete_direct_chat(&self, id: u64) -> Result<bool> {
        self.remove_direct_chat(id)
    }

    fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.insert_group(group)
    }

    fn find_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>> {
        self.select_groups(filter)
    }

    fn delete_group(&self, id: u64) -> Result<bool> {
        self.remove_group(id)
    }

    fn create_membership(&self, group_id: u64, member_id: u64) -> Result<GroupMembership> {
        self.insert_membership(group_id, member_id)
    }

    fn find_memberships(&self, filter: &MembershipFilter) -> Result<Vec<GroupMembership>> {
        self.select_memberships(filter)
    }

    fn delete_memberships(&self, filter: &MembershipFilter) -> Result<usize> {
        self.remove_memberships(filter)
    }

    fn find_group_message_links(
        &self,
        filter: &GroupMessageFilter,
    ) -> Result<Vec<GroupMessageLink>> {
        self.select_group_message_links(filter)
    }

    fn create_message(&self, message: &NewMessage) -> Result<Message> {
        self.insert_message(message)
    }

    fn find_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>> {
        self.select_messages(filter)
    }

    fn count_messages(&self, filter: &MessageFilter) -> Result<usize> {
        self.select_message_count(filter)
    }

    fn mark_read(&self, ids: &[u64]) -> Result<usize> {
        self.set_messages_read(ids)
    }

    fn delete_messages(&self, filter: &MessageFilter) -> Result<usize> {
        self.remove_messages(filter)
    }
}
