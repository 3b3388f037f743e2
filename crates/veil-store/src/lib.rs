//! # veil-store
//!
//! Durable storage for the Veil messaging engine, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. Schema migrations run on open and are guarded by the SQLite
//! `user_version` pragma.
//!
//! Concurrency discipline lives a layer up: the engine serializes chat
//! mutations with a per-chat lock, and the state-transition helpers here
//! are compare-and-swap updates so a lost race is always observable.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod read_state;

mod error;
mod util;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
