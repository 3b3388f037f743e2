//! # veil-shared
//!
//! Types shared across the Veil workspace: typed identifiers, the chat
//! state and message kind enums, policy constants, the opaque pagination
//! cursor codec, the anonymous alias generator, and the notification event
//! payloads handed to the external dispatch channel.

pub mod alias;
pub mod constants;
pub mod cursor;
pub mod events;
pub mod types;

pub use cursor::CursorError;
pub use types::{ChatId, ChatState, MessageId, MessageKind, UserId};
