//! # courier-store
//!
//! Persistence for the courier messaging backend, backed by SQLite.
//!
//! The crate exposes the [`Repository`] trait that the messaging core is
//! written against, the entity models and sparse filter types it speaks in,
//! and a [`Database`] handle that implements the trait over a
//! `rusqlite::Connection`.

pub mod database;
pub mod direct_chats;
pub mod filters;
pub mod groups;
pub mod memberships;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod repository;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use filters::*;
pub use models::*;
pub use repository::Repository;
