//! The reveal state machine.
//!
//! States: `anonymous → reveal_pending → normal`, with a back-edge to
//! `anonymous` on decline. `normal` is terminal.
//!
//! The functions here are pure decision makers over a loaded [`Chat`]
//! record: no IO, no async. The engine applies an approved decision under
//! the chat's lock via the store's compare-and-swap transition helpers, so
//! a concurrent writer that slipped in between load and apply surfaces as
//! a failed swap, reported to the loser as `InvalidState`.

use serde::Serialize;

use veil_shared::types::{ChatState, UserId};
use veil_store::Chat;

use crate::error::{EngineError, Result};

/// Derived view of how close a chat is to the reveal threshold.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RevealEligibility {
    pub can_request_reveal: bool,
    pub required: u32,
    /// Counted messages, capped at `required`.
    pub current: u32,
    pub remaining: u32,
}

/// Compute eligibility for a chat against the configured threshold.
pub fn eligibility(chat: &Chat, required: u32) -> RevealEligibility {
    let current = chat.message_count.clamp(0, i64::from(required)) as u32;
    RevealEligibility {
        can_request_reveal: chat.state == ChatState::Anonymous && current >= required,
        required,
        current,
        remaining: required - current,
    }
}

/// Validate a reveal request. Valid only from `anonymous`, only for a
/// participant, and only once the threshold is met (`message_count ==
/// required` is enough).
pub fn check_request(chat: &Chat, requester: UserId, required: u32) -> Result<()> {
    if !chat.is_participant(requester) {
        return Err(EngineError::InvalidSender);
    }
    if chat.state != ChatState::Anonymous {
        return Err(EngineError::InvalidState {
            expected: ChatState::Anonymous,
        });
    }

    let progress = eligibility(chat, required);
    if !progress.can_request_reveal {
        return Err(EngineError::NotEligible {
            required,
            current: progress.current,
        });
    }
    Ok(())
}

/// Validate an accept or decline. Valid only from `reveal_pending`, and
/// only for the participant who did *not* make the request: a requester
/// can never answer their own proposal.
pub fn check_response(chat: &Chat, responder: UserId) -> Result<()> {
    if !chat.is_participant(responder) {
        return Err(EngineError::NotAuthorized);
    }
    if chat.state != ChatState::RevealPending {
        return Err(EngineError::InvalidState {
            expected: ChatState::RevealPending,
        });
    }
    if chat.reveal_requested_by == Some(responder) {
        return Err(EngineError::NotAuthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veil_shared::types::{pair_key, ChatId};

    fn chat_with(state: ChatState, count: i64, a: UserId, b: UserId) -> Chat {
        let now = Utc::now();
        Chat {
            id: ChatId::new(),
            pair_key: pair_key(a, b),
            participant_a: a,
            participant_b: b,
            alias_a: "Clever Raven".into(),
            alias_b: "Velvet Seal".into(),
            state,
            message_count: count,
            reveal_requested_by: (state == ChatState::RevealPending).then_some(a),
            reveal_requested_at: (state == ChatState::RevealPending).then(|| now),
            revealed_at: (state == ChatState::Normal).then(|| now),
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    #[test]
    fn eligibility_caps_current_at_required() {
        let a = UserId::new();
        let chat = chat_with(ChatState::Anonymous, 50, a, UserId::new());
        let progress = eligibility(&chat, 20);
        assert_eq!(progress.current, 20);
        assert_eq!(progress.remaining, 0);
        assert!(progress.can_request_reveal);
    }

    #[test]
    fn eligibility_reports_remaining() {
        let a = UserId::new();
        let chat = chat_with(ChatState::Anonymous, 3, a, UserId::new());
        let progress = eligibility(&chat, 20);
        assert_eq!(progress.current, 3);
        assert_eq!(progress.remaining, 17);
        assert!(!progress.can_request_reveal);
    }

    #[test]
    fn zero_threshold_is_immediately_eligible() {
        let a = UserId::new();
        let chat = chat_with(ChatState::Anonymous, 0, a, UserId::new());
        assert!(check_request(&chat, a, 0).is_ok());
    }

    #[test]
    fn request_threshold_boundary() {
        let a = UserId::new();
        let b = UserId::new();

        // Exactly at the threshold: succeeds.
        let at = chat_with(ChatState::Anonymous, 5, a, b);
        assert!(check_request(&at, a, 5).is_ok());

        // One short: NotEligible with the precise numbers.
        let short = chat_with(ChatState::Anonymous, 4, a, b);
        match check_request(&short, a, 5) {
            Err(EngineError::NotEligible { required, current }) => {
                assert_eq!(required, 5);
                assert_eq!(current, 4);
            }
            other => panic!("expected NotEligible, got {other:?}"),
        }
    }

    #[test]
    fn request_rejects_outsiders_before_anything_else() {
        let chat = chat_with(ChatState::Anonymous, 100, UserId::new(), UserId::new());
        assert!(matches!(
            check_request(&chat, UserId::new(), 5),
            Err(EngineError::InvalidSender)
        ));
    }

    #[test]
    fn request_only_from_anonymous() {
        let a = UserId::new();
        let b = UserId::new();

        let pending = chat_with(ChatState::RevealPending, 100, a, b);
        assert!(matches!(
            check_request(&pending, b, 5),
            Err(EngineError::InvalidState { expected: ChatState::Anonymous })
        ));

        let normal = chat_with(ChatState::Normal, 100, a, b);
        assert!(matches!(
            check_request(&normal, a, 5),
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[test]
    fn requester_cannot_answer_own_request() {
        let a = UserId::new();
        let b = UserId::new();
        let chat = chat_with(ChatState::RevealPending, 100, a, b);

        // `a` is the requester (see chat_with).
        assert!(matches!(check_response(&chat, a), Err(EngineError::NotAuthorized)));
        assert!(check_response(&chat, b).is_ok());
    }

    #[test]
    fn response_rejects_outsiders() {
        let chat = chat_with(ChatState::RevealPending, 100, UserId::new(), UserId::new());
        assert!(matches!(
            check_response(&chat, UserId::new()),
            Err(EngineError::NotAuthorized)
        ));
    }

    #[test]
    fn response_only_while_pending() {
        let a = UserId::new();
        let b = UserId::new();

        let anon = chat_with(ChatState::Anonymous, 100, a, b);
        assert!(matches!(
            check_response(&anon, b),
            Err(EngineError::InvalidState { expected: ChatState::RevealPending })
        ));

        // Normal is terminal: nothing transitions out of it.
        let normal = chat_with(ChatState::Normal, 100, a, b);
        assert!(matches!(check_response(&normal, b), Err(EngineError::InvalidState { .. })));
    }
}
