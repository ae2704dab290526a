use async_trait::async_trait;

use super::event::{InboundMessage, Outbox};
use crate::actions::registry::ActionRegistry;
use crate::actions::types::{ActionInstance, FulfillResult};
use crate::error::FlowResult;

/// Extension points of the turn pipeline. Every method has a working default.
#[async_trait]
pub trait DialogHooks: Send + Sync {
    /// Text sent to the NLU services for an inbound message.
    fn query_text(&self, message: &InboundMessage) -> String {
        message.text.trim().to_string()
    }

    /// Inspect or replace the action resolved from the winning intent.
    fn on_action_resolved(&self, _intent: &str, action: ActionInstance) -> ActionInstance {
        action
    }

    /// Inject request-scoped data into a freshly built parent context.
    fn on_context_created(&self, _context: &mut ActionInstance, _message: &InboundMessage) {}

    /// Called when the winning intent has no bound action.
    async fn no_action_detected(&self, _message: &InboundMessage, _outbox: &Outbox) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fulfillment step run by the dispatcher right before the handler.
    async fn fulfill(
        &self,
        registry: &ActionRegistry,
        _intent: &str,
        action: &ActionInstance,
    ) -> FlowResult<FulfillResult> {
        registry.fulfill(action, None).await
    }
}

pub struct DefaultHooks;

#[async_trait]
impl DialogHooks for DefaultHooks {}
