//! End-to-end tests of the engine: the full send → eligibility → reveal →
//! projection flow against a real on-disk store.

use std::collections::HashMap;
use std::sync::Arc;

use veil_engine::dispatch::NullDispatcher;
use veil_engine::identity::{IdentityProvider, RealProfile};
use veil_engine::{ChatEngine, EngineConfig, EngineError};
use veil_shared::types::{ChatState, UserId};
use veil_store::Database;

/// Identity provider with a fixed name table, standing in for the
/// platform's identity service.
struct MapProvider {
    names: HashMap<UserId, String>,
}

impl MapProvider {
    fn with(users: &[(UserId, &str)]) -> Arc<Self> {
        Arc::new(Self {
            names: users
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
        })
    }
}

impl IdentityProvider for MapProvider {
    fn real_profile(&self, user: UserId) -> Option<RealProfile> {
        self.names.get(&user).map(|name| RealProfile {
            display_name: Some(name.clone()),
            avatar_url: None,
        })
    }
}

struct Harness {
    engine: Arc<ChatEngine>,
    _dir: tempfile::TempDir,
}

fn harness(threshold: u32, identity: Arc<dyn IdentityProvider>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).unwrap();
    let config = EngineConfig {
        reveal_threshold: threshold,
        ..EngineConfig::default()
    };
    Harness {
        engine: Arc::new(ChatEngine::new(db, config, identity, Arc::new(NullDispatcher))),
        _dir: dir,
    }
}

#[tokio::test]
async fn reveal_flow_end_to_end() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(3, MapProvider::with(&[(u1, "Ana"), (u2, "Ben")]));
    let chat = h.engine.start_chat(u1, u2).await.unwrap();

    h.engine.send_message(chat.id, u1, "hi").await.unwrap();
    h.engine.send_message(chat.id, u1, "you there?").await.unwrap();

    // Two counted messages, threshold three: not yet.
    match h.engine.request_reveal(chat.id, u1).await {
        Err(EngineError::NotEligible { required, current }) => {
            assert_eq!(required, 3);
            assert_eq!(current, 2);
        }
        other => panic!("expected NotEligible, got {other:?}"),
    }

    h.engine.send_message(chat.id, u1, "third time lucky").await.unwrap();

    let pending = h.engine.request_reveal(chat.id, u1).await.unwrap();
    assert_eq!(pending.state, ChatState::RevealPending);
    assert_eq!(pending.reveal_requested_by_me, Some(true));
    // Still masked while pending.
    assert_ne!(pending.partner_display_name, "Ben");

    let revealed = h.engine.accept_reveal(chat.id, u2).await.unwrap();
    assert_eq!(revealed.state, ChatState::Normal);
    assert!(revealed.revealed_at.is_some());
    assert_eq!(revealed.reveal_requested_by_me, None);
    assert_eq!(revealed.partner_display_name, "Ana");

    // Both sides now resolve real names.
    let from_u1 = h.engine.get_chat(chat.id, u1).await.unwrap();
    assert_eq!(from_u1.partner_display_name, "Ben");

    // The transcript carries the synthetic markers in order.
    let page = h.engine.list_messages(chat.id, u2, None, None).await.unwrap();
    let kinds: Vec<_> = page.items.iter().map(|m| m.kind.as_str()).collect();
    assert_eq!(kinds, ["text", "text", "text", "reveal_request", "reveal_accepted"]);
}

#[tokio::test]
async fn requester_cannot_answer_own_request() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(1, MapProvider::with(&[]));
    let chat = h.engine.start_chat(u1, u2).await.unwrap();

    h.engine.send_message(chat.id, u1, "hello").await.unwrap();
    h.engine.request_reveal(chat.id, u1).await.unwrap();

    assert!(matches!(
        h.engine.accept_reveal(chat.id, u1).await,
        Err(EngineError::NotAuthorized)
    ));
    assert!(matches!(
        h.engine.decline_reveal(chat.id, u1).await,
        Err(EngineError::NotAuthorized)
    ));

    // The failed attempts changed nothing.
    let view = h.engine.get_chat(chat.id, u2).await.unwrap();
    assert_eq!(view.state, ChatState::RevealPending);
    assert_eq!(view.reveal_requested_by_me, Some(false));
}

#[tokio::test]
async fn decline_allows_immediate_rerequest() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(1, MapProvider::with(&[]));
    let chat = h.engine.start_chat(u1, u2).await.unwrap();
    h.engine.send_message(chat.id, u1, "hello").await.unwrap();

    h.engine.request_reveal(chat.id, u1).await.unwrap();
    let declined = h.engine.decline_reveal(chat.id, u2).await.unwrap();
    assert_eq!(declined.state, ChatState::Anonymous);
    assert!(declined.revealed_at.is_none());

    // No cooldown: either side may ask again right away.
    let again = h.engine.request_reveal(chat.id, u2).await.unwrap();
    assert_eq!(again.state, ChatState::RevealPending);
    assert_eq!(again.reveal_requested_by_me, Some(true));
}

#[tokio::test]
async fn concurrent_responses_have_exactly_one_winner() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(1, MapProvider::with(&[]));
    let chat_id = h.engine.start_chat(u1, u2).await.unwrap().id;
    h.engine.send_message(chat_id, u1, "hello").await.unwrap();
    h.engine.request_reveal(chat_id, u1).await.unwrap();

    let accept = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.accept_reveal(chat_id, u2).await })
    };
    let decline = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.decline_reveal(chat_id, u2).await })
    };

    let accept = accept.await.unwrap();
    let decline = decline.await.unwrap();

    let final_state = h.engine.get_chat(chat_id, u1).await.unwrap().state;
    match (&accept, &decline) {
        (Ok(_), Err(EngineError::InvalidState { .. })) => {
            assert_eq!(final_state, ChatState::Normal);
        }
        (Err(EngineError::InvalidState { .. }), Ok(_)) => {
            assert_eq!(final_state, ChatState::Anonymous);
        }
        other => panic!("expected one winner and one InvalidState, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_requests_have_exactly_one_winner() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(1, MapProvider::with(&[]));
    let chat_id = h.engine.start_chat(u1, u2).await.unwrap().id;
    h.engine.send_message(chat_id, u1, "hello").await.unwrap();

    let first = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.request_reveal(chat_id, u1).await })
    };
    let second = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.request_reveal(chat_id, u2).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(EngineError::InvalidState { .. }))));

    // Exactly one synthetic request marker made it into the transcript.
    let page = h.engine.list_messages(chat_id, u1, None, None).await.unwrap();
    let markers = page
        .items
        .iter()
        .filter(|m| m.kind.as_str() == "reveal_request")
        .count();
    assert_eq!(markers, 1);
}

#[tokio::test]
async fn deletion_hides_content_but_never_retracts_the_counter() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(3, MapProvider::with(&[]));
    let chat = h.engine.start_chat(u1, u2).await.unwrap();

    h.engine.send_message(chat.id, u1, "one").await.unwrap();
    let second = h.engine.send_message(chat.id, u1, "two").await.unwrap();
    h.engine.send_message(chat.id, u1, "three").await.unwrap();

    h.engine.delete_message(second.id, u1).await.unwrap();
    // Idempotent: the repeat succeeds without effect.
    h.engine.delete_message(second.id, u1).await.unwrap();
    // The partner cannot delete someone else's message.
    let third = h.engine.send_message(chat.id, u1, "four").await.unwrap();
    assert!(matches!(
        h.engine.delete_message(third.id, u2).await,
        Err(EngineError::NotAuthorized)
    ));

    // The partner's transcript no longer shows the deleted content.
    let for_partner = h.engine.list_messages(chat.id, u2, None, None).await.unwrap();
    assert!(for_partner.items.iter().all(|m| m.content != "two"));
    // The deleter keeps an audit view of their own message.
    let for_deleter = h.engine.list_messages(chat.id, u1, None, None).await.unwrap();
    let audit = for_deleter.items.iter().find(|m| m.id == second.id).unwrap();
    assert!(audit.deleted);
    assert_eq!(audit.content, "two");

    // The ratchet still counts it: eligibility is unaffected.
    let view = h.engine.get_chat(chat.id, u1).await.unwrap();
    assert_eq!(view.message_count, 4);
    assert!(view.eligibility.can_request_reveal);
    h.engine.request_reveal(chat.id, u1).await.unwrap();
}

#[tokio::test]
async fn message_pagination_is_restartable() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let h = harness(100, MapProvider::with(&[]));
    let chat = h.engine.start_chat(u1, u2).await.unwrap();

    for i in 0..7 {
        h.engine
            .send_message(chat.id, u1, &format!("m{i}"))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = h
            .engine
            .list_messages(chat.id, u2, cursor.as_deref(), Some(3))
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|m| m.content.clone()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let expected: Vec<_> = (0..7).map(|i| format!("m{i}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn inbox_reflects_activity_unread_and_masking() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let u3 = UserId::new();
    let h = harness(100, MapProvider::with(&[(u2, "Ben")]));

    let quiet = h.engine.start_chat(u1, u3).await.unwrap();
    let busy = h.engine.start_chat(u1, u2).await.unwrap();
    h.engine.send_message(busy.id, u2, "ping").await.unwrap();
    h.engine.send_message(busy.id, u2, "ping again").await.unwrap();

    let inbox = h.engine.list_chats(u1, None, None).await.unwrap();
    assert_eq!(inbox.items.len(), 2);
    assert!(inbox.next_cursor.is_none());

    // Most recent activity first.
    assert_eq!(inbox.items[0].chat_id, busy.id);
    assert_eq!(inbox.items[1].chat_id, quiet.id);

    let entry = &inbox.items[0];
    assert_eq!(entry.unread_count, 2);
    assert_eq!(entry.last_message_preview.as_deref(), Some("ping again"));
    // Pre-reveal, the inbox shows the partner's alias, not "Ben".
    assert_ne!(entry.partner_display_name, "Ben");

    // Reading the chat clears the counter.
    h.engine.mark_read(busy.id, u1, None).await.unwrap();
    let inbox = h.engine.list_chats(u1, None, None).await.unwrap();
    assert_eq!(inbox.items[0].unread_count, 0);
}

#[tokio::test]
async fn operation_failure_kinds() {
    let u1 = UserId::new();
    let u2 = UserId::new();
    let stranger = UserId::new();
    let h = harness(1, MapProvider::with(&[]));

    assert!(matches!(
        h.engine.start_chat(u1, u1).await,
        Err(EngineError::SameUser)
    ));

    let chat = h.engine.start_chat(u1, u2).await.unwrap();

    assert!(matches!(
        h.engine.send_message(chat.id, stranger, "hi").await,
        Err(EngineError::InvalidSender)
    ));
    assert!(matches!(
        h.engine
            .send_message(veil_shared::types::ChatId::new(), u1, "hi")
            .await,
        Err(EngineError::ChatNotFound)
    ));
    assert!(matches!(
        h.engine.list_messages(chat.id, stranger, None, None).await,
        Err(EngineError::NotAuthorized)
    ));
    assert!(matches!(
        h.engine.mark_read(chat.id, stranger, None).await,
        Err(EngineError::NotAuthorized)
    ));
    assert!(matches!(
        h.engine.request_reveal(chat.id, stranger).await,
        Err(EngineError::InvalidSender)
    ));
    assert!(matches!(
        h.engine
            .list_messages(chat.id, u1, Some("not-a-cursor"), None)
            .await,
        Err(EngineError::InvalidCursor(_))
    ));
}
