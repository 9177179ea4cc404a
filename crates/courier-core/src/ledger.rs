//! The message ledger: send, delete and enumerate conversation messages.
//!
//! Enumeration through [`MessageLedger::fetch_recent`] is the only path that
//! mutates read state. A message flips to read when anyone other than its
//! sender fetches it, and it never flips back.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use courier_store::{Message, MessageFilter, NewMessage, Repository};

use crate::access::AccessControl;
use crate::error::{CoreError, Result};
use crate::types::{Conversation, Principal};

/// Upper bound on message length, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

#[derive(Clone)]
pub struct MessageLedger {
    repo: Arc<dyn Repository>,
    access: AccessControl,
}

impl MessageLedger {
    pub fn new(repo: Arc<dyn Repository>, access: AccessControl) -> Self {
        Self { repo, access }
    }

    /// Append a message to `conversation` as `principal`.
    ///
    /// Group messages get their link row in the same atomic write.
    pub fn send(
        &self,
        principal: Principal,
        conversation: Conversation,
        content: &str,
    ) -> Result<Message> {
        self.access.require_participant(principal, conversation)?;
        validate_content(content)?;

        let message = self.repo.create_message(&NewMessage {
            conversation_id: conversation.id,
            sender_id: principal.id(),
            kind: conversation.kind,
            content: content.to_string(),
            created_at: Utc::now(),
        })?;

        info!(%principal, %conversation, message_id = message.id, "message sent");
        Ok(message)
    }

    /// Delete one message. Any participant may delete any message of a
    /// conversation they belong to; the sender is not checked.
    pub fn delete(
        &self,
        principal: Principal,
        conversation: Conversation,
        message_id: u64,
    ) -> Result<()> {
        self.access.require_participant(principal, conversation)?;

        let removed = self.repo.delete_messages(&MessageFilter {
            id: Some(message_id),
            ..MessageFilter::conversation(conversation.kind, conversation.id)
        })?;
        if removed == 0 {
            return Err(CoreError::NotFound(format!(
                "message {message_id} in {conversation}"
            )));
        }

        info!(%principal, %conversation, message_id, "message deleted");
        Ok(())
    }

    /// The `count` most recent messages, newest first.
    ///
    /// Every unread message of the conversation not sent by `principal` is
    /// marked read, including those outside the returned window. Messages
    /// are returned as they were stored when fetched. Ties on the creation
    /// timestamp keep insertion order.
    pub fn fetch_recent(
        &self,
        principal: Principal,
        conversation: Conversation,
        count: usize,
    ) -> Result<Vec<Message>> {
        self.access.require_participant(principal, conversation)?;

        let mut messages = self
            .repo
            .find_messages(&MessageFilter::conversation(conversation.kind, conversation.id))?;

        let unread_from_others: Vec<u64> = messages
            .iter()
            .filter(|m| !m.is_read && m.sender_id != principal.id())
            .map(|m| m.id)
            .collect();
        if !unread_from_others.is_empty() {
            let marked = self.repo.mark_read(&unread_from_others)?;
            debug!(%principal, %conversation, marked, "marked messages read");
        }

        // Stable: equal timestamps stay in insertion order.
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(count);
        Ok(messages)
    }

    /// Number of unread messages in `conversation`. Read-only.
    pub fn unread_count(&self, conversation: Conversation) -> Result<usize> {
        let count = self.repo.count_messages(
            &MessageFilter::conversation(conversation.kind, conversation.id).unread(),
        )?;
        Ok(count)
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.is_empty() {
        return Err(CoreError::InvalidInput(
            "message content can not be empty".into(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(CoreError::InvalidInput(format!(
            "message content exceeds {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use courier_store::{GroupMessageFilter, NewGroup};

    use super::*;
    use crate::testing::messaging;

    #[test]
    fn direct_chat_scenario() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);

        let sent = m.ledger.send(Principal(1), conv, "hi").unwrap();
        assert!(!sent.is_read);

        let fetched = m.ledger.fetch_recent(Principal(2), conv, 10).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].content, "hi");
        assert_eq!(fetched[0].sender_id, 1);

        let stored = db.find_messages(&MessageFilter::default()).unwrap();
        assert!(stored[0].is_read);

        let outsider = m.ledger.fetch_recent(Principal(3), conv, 10).unwrap_err();
        assert!(outsider.is_not_found());
    }

    #[test]
    fn group_scenario() {
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

        let sent = m.ledger.send(Principal(11), conv, "hello group").unwrap();
        let links = db
            .find_group_message_links(&GroupMessageFilter {
                message_id: Some(sent.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].group_id, group.id);

        let err = m.ledger.send(Principal(20), conv, "let me in").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(db.find_messages(&MessageFilter::default()).unwrap().len(), 1);
        assert_eq!(
            db.find_group_message_links(&GroupMessageFilter::default())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn content_bounds() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);

        assert!(matches!(
            m.ledger.send(Principal(1), conv, ""),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            m.ledger.send(Principal(1), conv, &"x".repeat(MAX_CONTENT_CHARS + 1)),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(m
            .ledger
            .send(Principal(1), conv, &"é".repeat(MAX_CONTENT_CHARS))
            .is_ok());
        assert_eq!(db.find_messages(&MessageFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn any_participant_may_delete() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);
        let sent = m.ledger.send(Principal(1), conv, "oops").unwrap();

        assert!(m.ledger.delete(Principal(3), conv, sent.id).unwrap_err().is_not_found());
        m.ledger.delete(Principal(2), conv, sent.id).unwrap();
        assert!(matches!(
            m.ledger.delete(Principal(2), conv, sent.id),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_is_scoped_to_the_conversation() {
        let (m, db) = messaging();
        let ours = db.create_direct_chat(1, 2).unwrap();
        let theirs = db.create_direct_chat(3, 4).unwrap();
        let foreign = m
            .ledger
            .send(Principal(3), Conversation::direct(theirs.id), "private")
            .unwrap();

        let err = m
            .ledger
            .delete(Principal(1), Conversation::direct(ours.id), foreign.id)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(db.find_messages(&MessageFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn group_delete_removes_link() {
        let (m, db) = messaging();
        let group = db
            .create_group(&NewGroup {
                name: "g".into(),
                description: String::new(),
                creator_id: 9,
            })
            .unwrap();
        let conv = Conversation::group(group.id);
        let sent = m.ledger.send(Principal(9), conv, "bye").unwrap();

        m.ledger.delete(Principal(9), conv, sent.id).unwrap();
        assert!(db
            .find_group_message_links(&GroupMessageFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn fetch_zero_still_marks_everything_read() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);
        for text in ["a", "b", "c"] {
            m.ledger.send(Principal(1), conv, text).unwrap();
        }

        assert!(m.ledger.fetch_recent(Principal(2), conv, 0).unwrap().is_empty());
        assert_eq!(m.ledger.unread_count(conv).unwrap(), 0);
    }

    #[test]
    fn own_messages_stay_unread_for_the_sender() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);
        m.ledger.send(Principal(1), conv, "a").unwrap();

        m.ledger.fetch_recent(Principal(1), conv, 10).unwrap();
        assert_eq!(m.ledger.unread_count(conv).unwrap(), 1);

        m.ledger.fetch_recent(Principal(2), conv, 10).unwrap();
        assert_eq!(m.ledger.unread_count(conv).unwrap(), 0);

        // Nothing ever resets the flag.
        m.ledger.send(Principal(2), conv, "b").unwrap();
        m.ledger.fetch_recent(Principal(1), conv, 10).unwrap();
        assert!(db
            .find_messages(&MessageFilter::default())
            .unwrap()
            .iter()
            .all(|msg| msg.is_read));
    }

    #[test]
    fn truncation_orders_newest_first_with_stable_ties() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let offsets = [0, 2, 1, 2];
        for (i, secs) in offsets.iter().enumerate() {
            db.create_message(&NewMessage {
                conversation_id: chat.id,
                sender_id: 1,
                kind: conv.kind,
                content: format!("m{i}"),
                created_at: base + Duration::seconds(*secs),
            })
            .unwrap();
        }

        let got: Vec<String> = m
            .ledger
            .fetch_recent(Principal(2), conv, 3)
            .unwrap()
            .into_iter()
            .map(|msg| msg.content)
            .collect();
        assert_eq!(got, vec!["m1", "m3", "m2"]);

        assert_eq!(m.ledger.fetch_recent(Principal(2), conv, 100).unwrap().len(), 4);
    }

    #[test]
    fn unread_count_is_scoped_by_kind() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        m.ledger
            .send(Principal(1), Conversation::direct(chat.id), "hi")
            .unwrap();

        assert_eq!(m.ledger.unread_count(Conversation::direct(chat.id)).unwrap(), 1);
        assert_eq!(m.ledger.unread_count(Conversation::group(chat.id)).unwrap(), 0);
    }
}
