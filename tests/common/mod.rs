#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intentflow::actions::registry::{ActionRegistry, FnBehavior};
use intentflow::actions::types::{ActionInstance, FulfillResult};
use intentflow::kernel::dialog::{ActionDialog, TurnOutcome};
use intentflow::kernel::dispatcher::HandlerTable;
use intentflow::kernel::event::{InboundMessage, OutboundMessage, Outbox};
use intentflow::kernel::session::DialogSession;
use intentflow::nlu::service::NluService;
use intentflow::nlu::types::{Entity, IntentCandidate, NluResult};
use intentflow::FlowResult;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Returns the same result for every query.
pub struct StaticNlu {
    pub name: String,
    pub result: NluResult,
}

impl StaticNlu {
    pub fn new(name: &str, candidates: &[(&str, f32)], entities: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            result: NluResult {
                query: String::new(),
                candidates: candidates.iter().map(|(i, s)| IntentCandidate::new(*i, *s)).collect(),
                entities: entities.iter().map(|(k, v)| Entity::new(*k, *v)).collect(),
            },
        }
    }
}

#[async_trait]
impl NluService for StaticNlu {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, text: &str, _cancel: &CancellationToken) -> anyhow::Result<NluResult> {
        let mut result = self.result.clone();
        result.query = text.to_string();
        Ok(result)
    }
}

pub struct FailingNlu(pub &'static str);

#[async_trait]
impl NluService for FailingNlu {
    fn name(&self) -> &str {
        self.0
    }

    async fn query(&self, _text: &str, _cancel: &CancellationToken) -> anyhow::Result<NluResult> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

/// Never answers.
pub struct StuckNlu;

#[async_trait]
impl NluService for StuckNlu {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn query(&self, _text: &str, _cancel: &CancellationToken) -> anyhow::Result<NluResult> {
        futures::future::pending::<()>().await;
        Ok(NluResult::default())
    }
}

/// Behavior that echoes the action name, for registries built in tests.
pub fn echo() -> FnBehavior<impl Fn(ActionInstance) -> futures::future::Ready<anyhow::Result<FulfillResult>> + Send + Sync> {
    FnBehavior(|action: ActionInstance| futures::future::ready(Ok(FulfillResult::Text(format!("done {}", action.action)))))
}

/// Handler table that records every dispatched intent.
pub fn recording_handlers() -> (HandlerTable, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let table = HandlerTable::builder()
        .fallback(move |input| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(input.intent.clone());
                if let Some(text) = input.result.as_text() {
                    input.outbox.post(text);
                }
                Ok::<(), anyhow::Error>(())
            }
        })
        .build()
        .unwrap();
    (table, seen)
}

/// One conversation against one dialog, with the outbox drained after each turn.
pub struct Conversation {
    pub dialog: Arc<ActionDialog>,
    pub session: DialogSession,
    pub outbox: Outbox,
    rx: mpsc::UnboundedReceiver<OutboundMessage>,
    pub cancel: CancellationToken,
}

impl Conversation {
    pub fn new(dialog: Arc<ActionDialog>) -> Self {
        let (outbox, rx) = Outbox::channel("conv-1");
        Self {
            dialog,
            session: DialogSession::new("conv-1"),
            outbox,
            rx,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn say(&mut self, text: &str) -> FlowResult<TurnOutcome> {
        let message = InboundMessage::text("conv-1", text);
        self.dialog.handle(&mut self.session, &message, &self.outbox, &self.cancel).await
    }

    pub fn posted(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            texts.push(message.text);
        }
        texts
    }
}

pub fn travel_dialog() -> (Arc<ActionDialog>, Arc<Mutex<Vec<String>>>) {
    let (handlers, seen) = recording_handlers();
    let dialog = ActionDialog::builder(
        Arc::new(intentflow::demo::travel_registry().unwrap()),
        Arc::new(handlers),
    )
    .service(Arc::new(intentflow::demo::travel_nlu("keywords").unwrap()))
    .build()
    .unwrap();
    (Arc::new(dialog), seen)
}

pub fn registry_only() -> ActionRegistry {
    intentflow::demo::travel_registry().unwrap()
}
