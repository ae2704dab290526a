use tracing::{debug, info, warn};

use super::event::InboundMessage;
use super::hooks::DialogHooks;
use crate::actions::registry::ActionRegistry;
use crate::actions::types::ExecutionContextEntry;
use crate::nlu::types::ServiceResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The winning intent has no bound action.
    NoAction,
    /// A contextual action cannot start without a context. The friendly name
    /// of the offending action is carried for the user notice.
    ContextRequired { action: String },
    /// Single, fully valid action: dispatch right away.
    Ready(ExecutionContextEntry),
    /// Ancestor-first chain that still needs slot filling.
    Incomplete(Vec<ExecutionContextEntry>),
}

/// Turns a winning intent into an action plus its contextual ancestry.
pub struct ActionResolver<'a> {
    registry: &'a ActionRegistry,
    hooks: &'a dyn DialogHooks,
}

impl<'a> ActionResolver<'a> {
    pub fn new(registry: &'a ActionRegistry, hooks: &'a dyn DialogHooks) -> Self {
        Self { registry, hooks }
    }

    pub fn resolve(&self, winner: &ServiceResult, message: &InboundMessage) -> Resolution {
        let intent = winner.best.intent.clone();
        let entities = winner.result.entities_for(&winner.best);

        let action = match self.registry.build(&intent, entities) {
            Some(action) => action,
            None => {
                info!("No action bound to intent '{}'", intent);
                return Resolution::NoAction;
            }
        };
        let built = action.action.clone();
        let action = self.hooks.on_action_resolved(&intent, action);

        // A substituted instance routes under its own primary intent.
        let intent = if action.action == built {
            intent
        } else {
            match self.registry.descriptor_of(&action) {
                Ok(descriptor) => {
                    info!("Hook replaced '{}' with '{}'", intent, descriptor.intent);
                    descriptor.intent.clone()
                }
                Err(_) => {
                    warn!("Hook returned unregistered action '{}'", action.action);
                    return Resolution::NoAction;
                }
            }
        };

        // Walk up the context requirements, prefixing each ancestor.
        let mut chain = vec![ExecutionContextEntry::new(intent, action)];
        loop {
            let current = &chain[0].action;
            if !self.registry.is_contextual(current) {
                break;
            }
            if !self.registry.can_start_without_context(current) {
                let name = self.registry.friendly_name(current);
                info!("Contextual action '{}' cannot start without context", current.action);
                return Resolution::ContextRequired { action: name };
            }
            let Some((parent_intent, mut parent)) = self.registry.build_context(current) else {
                // Registry construction guarantees parents exist.
                let name = self.registry.friendly_name(current);
                return Resolution::ContextRequired { action: name };
            };
            self.hooks.on_context_created(&mut parent, message);
            debug!("Built context '{}' for '{}'", parent_intent, current.action);
            chain.insert(0, ExecutionContextEntry::new(parent_intent, parent));
        }

        let complete = chain.len() == 1
            && self
                .registry
                .descriptor_of(&chain[0].action)
                .map(|d| chain[0].action.validate(d).is_empty())
                .unwrap_or(false);

        if complete {
            let entry = chain.remove(0);
            Resolution::Ready(entry)
        } else {
            Resolution::Incomplete(chain)
        }
    }
}
