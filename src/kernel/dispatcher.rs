use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::event::{InboundMessage, Outbox};
use super::hooks::DialogHooks;
use crate::actions::registry::ActionRegistry;
use crate::actions::types::{ActionInstance, FulfillResult};
use crate::error::{FlowError, FlowResult};

/// Key of the handler used when no intent-specific one exists.
pub const DEFAULT_INTENT: &str = "";

/// Everything a handler gets for a completed action.
#[derive(Debug, Clone)]
pub struct HandlerInput {
    pub message: InboundMessage,
    pub intent: String,
    pub action: ActionInstance,
    pub result: FulfillResult,
    pub outbox: Outbox,
}

pub type Handler = Arc<dyn Fn(HandlerInput) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// How a handler declares the intent it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentBinding {
    /// No declared intent: the handler's own name is the key.
    Method(String),
    /// Declared intent. Blank means the wildcard default.
    Intent(String),
}

impl IntentBinding {
    fn key(&self) -> FlowResult<String> {
        match self {
            IntentBinding::Method(name) if name.trim().is_empty() => {
                Err(FlowError::Configuration("handler method name is blank".to_string()))
            }
            IntentBinding::Method(name) => Ok(name.clone()),
            IntentBinding::Intent(name) if name.trim().is_empty() => Ok(DEFAULT_INTENT.to_string()),
            IntentBinding::Intent(name) => Ok(name.clone()),
        }
    }
}

/// Read-only intent -> handler map with wildcard fallback.
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder::default()
    }

    pub fn lookup(&self, intent: &str) -> Option<&Handler> {
        self.handlers.get(intent).or_else(|| self.handlers.get(DEFAULT_INTENT))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Default)]
pub struct HandlerTableBuilder {
    bindings: Vec<(IntentBinding, Handler)>,
}

impl HandlerTableBuilder {
    pub fn bind<F, Fut>(mut self, binding: IntentBinding, handler: F) -> Self
    where
        F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |input| -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(handler(input)) });
        self.bindings.push((binding, handler));
        self
    }

    pub fn on<F, Fut>(self, intent: &str, handler: F) -> Self
    where
        F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.bind(IntentBinding::Intent(intent.to_string()), handler)
    }

    /// Wildcard handler for intents with no binding of their own.
    pub fn fallback<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(HandlerInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.bind(IntentBinding::Intent(DEFAULT_INTENT.to_string()), handler)
    }

    /// Fails on blank method names and on two bindings for one key.
    pub fn build(self) -> FlowResult<HandlerTable> {
        let mut handlers = HashMap::new();
        for (binding, handler) in self.bindings {
            let key = binding.key()?;
            if handlers.insert(key.clone(), handler).is_some() {
                let shown = if key.is_empty() { "<default>" } else { key.as_str() };
                return Err(FlowError::Configuration(format!("more than one handler bound to '{}'", shown)));
            }
        }
        Ok(HandlerTable { handlers })
    }
}

/// Routes a complete action to its handler.
pub struct Dispatcher {
    handlers: Arc<HandlerTable>,
}

impl Dispatcher {
    pub fn new(handlers: Arc<HandlerTable>) -> Self {
        Self { handlers }
    }

    /// Looks the handler up first so nothing is fulfilled when no handler exists.
    pub async fn dispatch(
        &self,
        registry: &ActionRegistry,
        hooks: &dyn DialogHooks,
        message: &InboundMessage,
        intent: String,
        action: ActionInstance,
        outbox: &Outbox,
    ) -> FlowResult<()> {
        let handler = self
            .handlers
            .lookup(&intent)
            .cloned()
            .ok_or_else(|| FlowError::NoHandler(intent.clone()))?;

        if !action.validate(registry.descriptor_of(&action)?).is_empty() {
            return Err(FlowError::IncompleteAction(intent));
        }

        let result = hooks.fulfill(registry, &intent, &action).await?;
        info!("Dispatching '{}'", intent);
        debug!("Fulfillment result for '{}': {:?}", intent, result);

        handler(HandlerInput {
            message: message.clone(),
            intent,
            action,
            result,
            outbox: outbox.clone(),
        })
        .await
        .map_err(FlowError::Handler)
    }
}
