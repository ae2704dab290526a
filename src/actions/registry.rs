use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::types::{ActionDescriptor, ActionInstance, FulfillResult};
use crate::error::{FlowError, FlowResult};
use crate::nlu::types::Entity;

/// What an action does once all its parameters are bound.
///
/// Contextual actions get their parent instance as `context` and may update it.
#[async_trait]
pub trait ActionBehavior: Send + Sync {
    async fn fulfill(
        &self,
        action: &ActionInstance,
        context: Option<&mut ActionInstance>,
    ) -> anyhow::Result<FulfillResult>;
}

/// Stock behavior for contextual actions: copy every bound value onto the parent.
pub struct ApplyToContext;

#[async_trait]
impl ActionBehavior for ApplyToContext {
    async fn fulfill(
        &self,
        action: &ActionInstance,
        context: Option<&mut ActionInstance>,
    ) -> anyhow::Result<FulfillResult> {
        if let Some(parent) = context {
            for (name, value) in &action.params {
                parent.rejected.remove(name);
                parent.params.insert(name.clone(), value.clone());
            }
        }
        Ok(FulfillResult::Empty)
    }
}

/// Adapts an async closure into an `ActionBehavior` for actions that do not
/// touch a context.
pub struct FnBehavior<F>(pub F);

#[async_trait]
impl<F, Fut> ActionBehavior for FnBehavior<F>
where
    F: Fn(ActionInstance) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<FulfillResult>> + Send,
{
    async fn fulfill(
        &self,
        action: &ActionInstance,
        _context: Option<&mut ActionInstance>,
    ) -> anyhow::Result<FulfillResult> {
        (self.0)(action.clone()).await
    }
}

struct RegisteredAction {
    descriptor: ActionDescriptor,
    behavior: Arc<dyn ActionBehavior>,
}

/// Read-only map from intent name to action type.
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
    /// Alias intent -> primary intent.
    intents: HashMap<String, String>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// Descriptor for an intent name or alias.
    pub fn descriptor(&self, intent: &str) -> Option<&ActionDescriptor> {
        let primary = self.intents.get(intent)?;
        self.actions.get(primary).map(|a| &a.descriptor)
    }

    /// Descriptor an instance was built from. Instances only come out of this
    /// registry, so the lookup cannot fail for them.
    pub fn descriptor_of(&self, action: &ActionInstance) -> FlowResult<&ActionDescriptor> {
        self.actions
            .get(&action.action)
            .map(|a| &a.descriptor)
            .ok_or_else(|| FlowError::Configuration(format!("unregistered action '{}'", action.action)))
    }

    pub fn is_contextual(&self, action: &ActionInstance) -> bool {
        self.descriptor_of(action).map_or(false, |d| d.is_contextual())
    }

    pub fn friendly_name(&self, action: &ActionInstance) -> String {
        self.descriptor_of(action)
            .map(|d| d.friendly_name.clone())
            .unwrap_or_else(|_| action.action.clone())
    }

    /// Builds an instance for `intent` from the given entities, or `None` if
    /// no action is bound to that intent.
    pub fn build<'a>(
        &self,
        intent: &str,
        entities: impl IntoIterator<Item = &'a Entity>,
    ) -> Option<ActionInstance> {
        let descriptor = self.descriptor(intent)?;
        let mut action = ActionInstance::new(descriptor.intent.clone());
        assign_entities(descriptor, &mut action, entities);
        Some(action)
    }

    /// Builds a placeholder parent for a contextual action.
    /// Returns the parent's intent together with the new instance.
    pub fn build_context(&self, action: &ActionInstance) -> Option<(String, ActionInstance)> {
        let spec = self.descriptor_of(action).ok()?.context.as_ref()?;
        let parent = self.descriptor(&spec.parent)?;
        Some((parent.intent.clone(), ActionInstance::new(parent.intent.clone())))
    }

    pub fn can_start_without_context(&self, action: &ActionInstance) -> bool {
        self.descriptor_of(action)
            .ok()
            .and_then(|d| d.context.as_ref())
            .map_or(false, |c| c.can_start_without_context)
    }

    /// Whether `child` may run nested inside `current`.
    pub fn is_valid_contextual_child(&self, child: &ActionInstance, current: &ActionInstance) -> bool {
        self.descriptor_of(child)
            .ok()
            .and_then(|d| d.context.as_ref())
            .map_or(false, |c| c.parent == current.action)
    }

    /// Whether `candidate` can replace `current` under the same parent.
    /// Non-contextual candidates always can; contextual ones need a
    /// contextual `current` sharing their parent.
    pub fn can_rehost(&self, candidate: &ActionInstance, current: &ActionInstance) -> bool {
        let candidate_parent = self
            .descriptor_of(candidate)
            .ok()
            .and_then(|d| d.context.as_ref())
            .map(|c| c.parent.as_str());
        let current_parent = self
            .descriptor_of(current)
            .ok()
            .and_then(|d| d.context.as_ref())
            .map(|c| c.parent.as_str());

        match candidate_parent {
            None => true,
            Some(parent) => current_parent == Some(parent),
        }
    }

    pub async fn fulfill(
        &self,
        action: &ActionInstance,
        context: Option<&mut ActionInstance>,
    ) -> FlowResult<FulfillResult> {
        let registered = self
            .actions
            .get(&action.action)
            .ok_or_else(|| FlowError::Configuration(format!("unregistered action '{}'", action.action)))?;
        debug!("Fulfilling '{}'", action.action);
        registered
            .behavior
            .fulfill(action, context)
            .await
            .map_err(|source| FlowError::Fulfillment {
                intent: action.action.clone(),
                source,
            })
    }
}

/// Binds every parameter that has a matching entity. First match wins.
pub fn assign_entities<'a>(
    descriptor: &ActionDescriptor,
    action: &mut ActionInstance,
    entities: impl IntoIterator<Item = &'a Entity>,
) -> bool {
    let entities: Vec<&Entity> = entities.into_iter().collect();
    let mut any = false;
    for spec in &descriptor.params {
        if let Some(entity) = entities.iter().find(|e| e.kind.eq_ignore_ascii_case(spec.entity_role())) {
            any |= action.bind(spec, &entity.value);
        }
    }
    any
}

#[derive(Default)]
pub struct ActionRegistryBuilder {
    actions: Vec<(ActionDescriptor, Arc<dyn ActionBehavior>)>,
}

impl ActionRegistryBuilder {
    pub fn action(mut self, descriptor: ActionDescriptor, behavior: impl ActionBehavior + 'static) -> Self {
        self.actions.push((descriptor, Arc::new(behavior)));
        self
    }

    /// Contextual action using `ApplyToContext`.
    pub fn contextual(self, descriptor: ActionDescriptor) -> Self {
        self.action(descriptor, ApplyToContext)
    }

    /// Validates the whole table up front so nothing surfaces mid-conversation.
    pub fn build(self) -> FlowResult<ActionRegistry> {
        let mut actions = HashMap::new();
        let mut intents = HashMap::new();

        for (descriptor, behavior) in self.actions {
            for intent in std::iter::once(&descriptor.intent).chain(descriptor.aliases.iter()) {
                if intents.insert(intent.clone(), descriptor.intent.clone()).is_some() {
                    return Err(FlowError::Configuration(format!("intent '{}' bound twice", intent)));
                }
            }
            for param in &descriptor.params {
                if let super::types::ValueKind::Choice(choices) = &param.kind {
                    if choices.is_empty() {
                        return Err(FlowError::Configuration(format!(
                            "parameter '{}' of '{}' has no choices",
                            param.name, descriptor.intent
                        )));
                    }
                }
            }
            actions.insert(descriptor.intent.clone(), RegisteredAction { descriptor, behavior });
        }

        // Context parents must exist; store them by primary intent.
        for (name, registered) in actions.iter_mut() {
            if let Some(spec) = registered.descriptor.context.as_mut() {
                let primary = intents.get(&spec.parent).ok_or_else(|| {
                    FlowError::Configuration(format!("'{}' depends on unknown context '{}'", name, spec.parent))
                })?;
                spec.parent = primary.clone();
            }
        }

        // Context chains must terminate.
        for (name, registered) in &actions {
            let mut seen = HashSet::new();
            seen.insert(name.as_str());
            let mut current = &registered.descriptor;
            while let Some(spec) = &current.context {
                if !seen.insert(spec.parent.as_str()) {
                    return Err(FlowError::Configuration(format!("cyclic context chain through '{}'", name)));
                }
                current = &actions[&spec.parent].descriptor;
            }
        }

        Ok(ActionRegistry { actions, intents })
    }
}
