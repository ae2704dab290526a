use serde::{Deserialize, Serialize};

use super::slot_filling::SlotFillingFlow;

/// Per-conversation state. Owned by exactly one conversation.
///
/// Serializing a session yields the snapshot a host would persist between
/// turns; proposed-switch data is session-scoped and left out of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogSession {
    pub conversation_id: String,
    flow: Option<SlotFillingFlow>,
}

impl DialogSession {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            flow: None,
        }
    }

    /// The slot-filling flow waiting for a reply, if any.
    pub fn flow(&self) -> Option<&SlotFillingFlow> {
        self.flow.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.flow.is_none()
    }

    pub(crate) fn take_flow(&mut self) -> Option<SlotFillingFlow> {
        self.flow.take()
    }

    pub(crate) fn park(&mut self, flow: SlotFillingFlow) {
        self.flow = Some(flow);
    }

    /// Drops any in-flight flow.
    pub fn reset(&mut self) {
        self.flow = None;
    }
}
