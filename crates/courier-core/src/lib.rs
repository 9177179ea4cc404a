//! # courier-core
//!
//! The message delivery and access-control engine.
//!
//! - [`access`] decides whether a principal participates in a conversation
//!   (or created a group)
//! - [`ledger`] sends, deletes and enumerates messages, flipping read flags
//!   as a side effect of enumeration
//! - [`directory`] lists a principal's conversations with unread counts
//! - [`chats`] and [`groups`] manage conversation lifecycles
//! - [`session`] drives long-lived streaming sessions over any
//!   [`SessionChannel`](session::SessionChannel)
//!
//! Everything runs against an abstract [`Repository`]; no component holds
//! locks or caches of its own.

pub mod access;
pub mod chats;
pub mod directory;
pub mod error;
pub mod groups;
pub mod ledger;
pub mod session;
pub mod types;

use std::sync::Arc;

use courier_store::Repository;

pub use error::CoreError;
pub use types::{Conversation, Principal};

/// Every core component wired to one repository.
#[derive(Clone)]
pub struct Messaging {
    pub access: access::AccessControl,
    pub ledger: ledger::MessageLedger,
    pub directory: directory::Directory,
    pub chats: chats::DirectChats,
    pub groups: groups::Groups,
}

impl Messaging {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        let access = access::AccessControl::new(repo.clone());
        let ledger = ledger::MessageLedger::new(repo.clone(), access.clone());
        Self {
            directory: directory::Directory::new(repo.clone(), ledger.clone()),
            chats: chats::DirectChats::new(repo.clone(), access.clone()),
            groups: groups::Groups::new(repo, access.clone()),
            ledger,
            access,
        }
    }
}
