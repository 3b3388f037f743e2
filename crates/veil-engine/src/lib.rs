//! # veil-engine
//!
//! The anonymous-to-identified messaging core. Two participants exchange
//! messages under per-chat pseudonyms; once enough counted messages have
//! accumulated, either side may request a reveal, and real identities
//! become visible only on mutual consent.
//!
//! The engine is transport-agnostic: [`ChatEngine`] exposes the full
//! operation surface as async methods, and the HTTP layer (or any other
//! caller) maps them 1:1. Internally the work is split into components
//! with single-writer ownership of their records:
//!
//! - [`registry`]: chat identity, participant pairing, state and counters
//!   (sole writer of the `chats` table)
//! - [`log`]: the append-only per-chat message log and soft-delete
//!   (sole writer of `messages`)
//! - [`read`]: per-user last-read markers (sole writer of `read_state`)
//! - [`reveal`]: the pure state machine deciding reveal transitions
//! - [`inbox`]: the read-only projection composing the above, and the one
//!   place where identity masking is decided
//!
//! Per-chat mutual exclusion comes from [`locks::ChatLocks`]; the store's
//! compare-and-swap transition helpers double as a safety net.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod identity;
pub mod inbox;
pub mod locks;
pub mod log;
pub mod read;
pub mod registry;
pub mod reveal;

mod error;

use serde::Serialize;

pub use config::EngineConfig;
pub use engine::ChatEngine;
pub use error::{EngineError, Result};
pub use inbox::{ChatView, InboxEntry, MessageView};
pub use reveal::RevealEligibility;

/// One page of a restartable listing. `next_cursor` is `None` on the last
/// page; otherwise the caller passes it back verbatim to resume.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}
