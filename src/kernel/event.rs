use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// A user message delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: String,
    pub source: String,
    pub text: String,
}

// Helper for tests and the console driver
impl InboundMessage {
    pub fn text(conversation_id: &str, text: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            source: "user".to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation_id: String,
    pub text: String,
}

/// Fire-and-forget channel for user-visible messages.
#[derive(Debug, Clone)]
pub struct Outbox {
    conversation_id: String,
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn new(conversation_id: impl Into<String>, tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            tx,
        }
    }

    /// Outbox plus the receiving end, for drivers that drain it themselves.
    pub fn channel(conversation_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(conversation_id, tx), rx)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn post(&self, text: impl Into<String>) {
        let message = OutboundMessage {
            conversation_id: self.conversation_id.clone(),
            text: text.into(),
        };
        if self.tx.send(message).is_err() {
            warn!("Outbox for '{}' is closed, message dropped", self.conversation_id);
        }
    }
}
