//! The notification collaborator seam.
//!
//! Delivery and fan-out are external concerns; the engine only reports
//! facts. Dispatch is fire-and-forget: a failure to hand off an event is
//! logged, never propagated into the operation that produced it.

use tokio::sync::mpsc;

use veil_shared::events::{NewMessagePayload, RevealStateChangedPayload};

pub trait Dispatcher: Send + Sync {
    fn message_created(&self, payload: NewMessagePayload);
    fn reveal_state_changed(&self, payload: RevealStateChangedPayload);
}

/// Dispatcher that drops every event. Used in tests and in deployments
/// without a notification pipeline.
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn message_created(&self, _payload: NewMessagePayload) {}
    fn reveal_state_changed(&self, _payload: RevealStateChangedPayload) {}
}

/// An event on its way to the external dispatch channel.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    NewMessage(NewMessagePayload),
    RevealStateChanged(RevealStateChangedPayload),
}

impl OutboundEvent {
    /// Routing key for the external channel.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::NewMessage(_) => veil_shared::events::EVENT_NEW_MESSAGE,
            OutboundEvent::RevealStateChanged(_) => {
                veil_shared::events::EVENT_REVEAL_STATE_CHANGED
            }
        }
    }
}

/// Dispatcher that forwards events into an unbounded channel; the receiver
/// side is handed to whatever task feeds the real notification pipeline.
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: OutboundEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::error!(event = e.0.name(), "Failed to hand off event for dispatch");
        }
    }
}

impl Dispatcher for ChannelDispatcher {
    fn message_created(&self, payload: NewMessagePayload) {
        self.send(OutboundEvent::NewMessage(payload));
    }

    fn reveal_state_changed(&self, payload: RevealStateChangedPayload) {
        self.send(OutboundEvent::RevealStateChanged(payload));
    }
}
