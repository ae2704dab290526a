use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dialog::ActionDialog;
use super::event::{InboundMessage, OutboundMessage, Outbox};
use super::session::DialogSession;

/// Host loop: one session per conversation, one turn at a time.
pub struct DialogRuntime {
    dialog: Arc<ActionDialog>,
    sessions: HashMap<String, DialogSession>,
    receiver: mpsc::Receiver<InboundMessage>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    shutdown: CancellationToken,
    turn_failed: Option<String>,
}

impl DialogRuntime {
    pub fn new(
        dialog: Arc<ActionDialog>,
        receiver: mpsc::Receiver<InboundMessage>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        let turn_failed = dialog.messages().turn_failed.clone();
        Self {
            dialog,
            sessions: HashMap::new(),
            receiver,
            outbound,
            shutdown,
            turn_failed,
        }
    }

    /// Session of a conversation with a flow in progress.
    pub fn session(&self, conversation_id: &str) -> Option<&DialogSession> {
        self.sessions.get(conversation_id)
    }

    /// Runs until shutdown is requested or every sender is gone.
    pub async fn run(&mut self) {
        info!("Dialog runtime started");
        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.step(message).await;
        }
        info!("Dialog runtime stopped");
    }

    /// Processes a single message. Turn failures are logged, reported to the
    /// user if configured, and never stop the loop.
    pub async fn step(&mut self, message: InboundMessage) {
        let conversation_id = message.conversation_id.clone();
        let session = self
            .sessions
            .entry(conversation_id.clone())
            .or_insert_with(|| DialogSession::new(conversation_id.clone()));
        let outbox = Outbox::new(conversation_id.clone(), self.outbound.clone());
        let cancel = self.shutdown.child_token();

        let result = self.dialog.handle(session, &message, &outbox, &cancel).await;
        let idle = session.is_idle();

        match result {
            Ok(outcome) => debug!("Turn for '{}' ended: {:?}", conversation_id, outcome),
            Err(e) => {
                warn!("Turn for '{}' failed: {}", conversation_id, e);
                if let Some(text) = &self.turn_failed {
                    outbox.post(text.clone());
                }
            }
        }

        // Idle sessions hold no state.
        if idle {
            self.sessions.remove(&conversation_id);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
