use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, HandlerTable};
use super::event::{InboundMessage, Outbox};
use super::hooks::{DefaultHooks, DialogHooks};
use super::resolver::{ActionResolver, Resolution};
use super::session::DialogSession;
use super::slot_filling::{FlowContext, FlowStep, SlotFillingFlow};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::recorder::{TelemetryRecorder, TelemetrySnapshot};
use crate::actions::extract::{NluValueExtractor, ValueExtractor};
use crate::actions::registry::ActionRegistry;
use crate::actions::types::ExecutionContextEntry;
use crate::config::{EngineConfig, Messages};
use crate::error::{FlowError, FlowResult};
use crate::nlu::fanout::query_all;
use crate::nlu::selector::{RankingPolicy, ScoreRanking, WinnerSelector};
use crate::nlu::service::NluService;

/// How a turn ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Dispatched { intent: String },
    /// A prompt was posted and the session holds the flow.
    AwaitingInput,
    NoActionDetected,
    /// A contextual action was requested with no context to run in.
    ContextRequired { action: String },
}

/// Turn driver: NLU fanout, winner selection, resolution, slot filling, dispatch.
///
/// Shared across conversations; all per-conversation state lives in the
/// `DialogSession` passed to `handle`.
pub struct ActionDialog {
    registry: Arc<ActionRegistry>,
    services: Vec<Arc<dyn NluService>>,
    selector: WinnerSelector,
    extractor: Arc<dyn ValueExtractor>,
    dispatcher: Dispatcher,
    hooks: Arc<dyn DialogHooks>,
    messages: Messages,
    telemetry: Mutex<TelemetryRecorder>,
}

impl ActionDialog {
    pub fn builder(registry: Arc<ActionRegistry>, handlers: Arc<HandlerTable>) -> ActionDialogBuilder {
        ActionDialogBuilder {
            registry,
            handlers,
            services: Vec::new(),
            ranking: None,
            extractor: None,
            hooks: None,
            messages: Messages::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        match self.telemetry.lock() {
            Ok(recorder) => recorder.snapshot(),
            Err(poisoned) => poisoned.into_inner().snapshot(),
        }
    }

    /// Handles one inbound message for one conversation.
    ///
    /// A failed turn drops whatever flow the session was holding.
    pub async fn handle(
        &self,
        session: &mut DialogSession,
        message: &InboundMessage,
        outbox: &Outbox,
        cancel: &CancellationToken,
    ) -> FlowResult<TurnOutcome> {
        let cx = self.flow_context(outbox, cancel);

        if let Some(mut flow) = session.take_flow() {
            debug!("Resuming flow for '{}' at depth {}", session.conversation_id, flow.depth());
            let reply = self.hooks.query_text(message);
            let step = flow.resume(&reply, &cx).await?;
            return self.settle(session, flow, step, message, &cx).await;
        }

        let text = self.hooks.query_text(message);
        let results = query_all(&self.services, &text, cancel).await?;

        let winner = match self.selector.select(&self.services, results) {
            Some(winner) => winner,
            None => {
                warn!("No winning intent for conversation '{}'", session.conversation_id);
                cx.record(TelemetryEvent::NoWinner);
                return Err(FlowError::NoWinningIntent);
            }
        };
        cx.record(TelemetryEvent::WinnerSelected {
            service: winner.service.clone(),
            intent: winner.best.intent.clone(),
        });

        let resolver = ActionResolver::new(&self.registry, self.hooks.as_ref());
        match resolver.resolve(&winner, message) {
            Resolution::NoAction => {
                cx.record(TelemetryEvent::NoActionDetected);
                if let Some(text) = &self.messages.no_action_detected {
                    outbox.post(text.clone());
                }
                self.hooks
                    .no_action_detected(message, outbox)
                    .await
                    .map_err(FlowError::Handler)?;
                Ok(TurnOutcome::NoActionDetected)
            }
            Resolution::ContextRequired { action } => {
                cx.record(TelemetryEvent::ContextRejected {
                    intent: winner.best.intent.clone(),
                });
                outbox.post(self.messages.context_required(&action));
                Ok(TurnOutcome::ContextRequired { action })
            }
            Resolution::Ready(entry) => {
                cx.record(TelemetryEvent::ActionResolved {
                    intent: entry.intent.clone(),
                    chain_len: 1,
                });
                self.dispatch(entry, message, &cx).await
            }
            Resolution::Incomplete(chain) => {
                let leaf = chain.last().map(|e| e.intent.clone()).unwrap_or_default();
                cx.record(TelemetryEvent::ActionResolved {
                    intent: leaf,
                    chain_len: chain.len(),
                });
                let (flow, step) = SlotFillingFlow::start(winner.service, chain, &cx).await?;
                self.settle(session, flow, step, message, &cx).await
            }
        }
    }

    /// Parks, dispatches, or restarts at a new root until the turn settles.
    async fn settle(
        &self,
        session: &mut DialogSession,
        mut flow: SlotFillingFlow,
        mut step: FlowStep,
        message: &InboundMessage,
        cx: &FlowContext<'_>,
    ) -> FlowResult<TurnOutcome> {
        loop {
            match step {
                FlowStep::AwaitingInput => {
                    session.park(flow);
                    return Ok(TurnOutcome::AwaitingInput);
                }
                FlowStep::Done(entry) => return self.dispatch(entry, message, cx).await,
                FlowStep::RootChange(entry) => {
                    info!("Restarting conversation '{}' at root '{}'", session.conversation_id, entry.intent);
                    let service = flow.service().to_string();
                    let (next, next_step) = SlotFillingFlow::start(service, vec![entry], cx).await?;
                    flow = next;
                    step = next_step;
                }
            }
        }
    }

    async fn dispatch(
        &self,
        entry: ExecutionContextEntry,
        message: &InboundMessage,
        cx: &FlowContext<'_>,
    ) -> FlowResult<TurnOutcome> {
        let intent = entry.intent.clone();
        self.dispatcher
            .dispatch(&self.registry, self.hooks.as_ref(), message, entry.intent, entry.action, cx.outbox)
            .await?;
        cx.record(TelemetryEvent::Dispatched { intent: intent.clone() });
        Ok(TurnOutcome::Dispatched { intent })
    }

    fn flow_context<'a>(&'a self, outbox: &'a Outbox, cancel: &'a CancellationToken) -> FlowContext<'a> {
        FlowContext {
            registry: &self.registry,
            extractor: self.extractor.as_ref(),
            services: &self.services,
            messages: &self.messages,
            outbox,
            telemetry: &self.telemetry,
            cancel,
        }
    }
}

pub struct ActionDialogBuilder {
    registry: Arc<ActionRegistry>,
    handlers: Arc<HandlerTable>,
    services: Vec<Arc<dyn NluService>>,
    ranking: Option<Arc<dyn RankingPolicy>>,
    extractor: Option<Arc<dyn ValueExtractor>>,
    hooks: Option<Arc<dyn DialogHooks>>,
    messages: Messages,
}

impl ActionDialogBuilder {
    pub fn service(mut self, service: Arc<dyn NluService>) -> Self {
        self.services.push(service);
        self
    }

    /// Messages and ranking thresholds from a loaded config.
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.messages = config.messages.clone();
        self.ranking = Some(Arc::new(ScoreRanking::from(&config.ranking)));
        self
    }

    pub fn ranking(mut self, ranking: Arc<dyn RankingPolicy>) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ValueExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn DialogHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> FlowResult<ActionDialog> {
        if self.services.is_empty() {
            return Err(FlowError::Configuration("at least one NLU service is required".to_string()));
        }
        let mut names: Vec<&str> = self.services.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(FlowError::Configuration(format!("NLU service '{}' registered twice", pair[0])));
        }

        let ranking = self.ranking.unwrap_or_else(|| Arc::new(ScoreRanking::default()));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(NluValueExtractor::new(self.registry.clone(), ranking.clone())));

        Ok(ActionDialog {
            registry: self.registry,
            services: self.services,
            selector: WinnerSelector::new(ranking),
            extractor,
            dispatcher: Dispatcher::new(self.handlers),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(DefaultHooks)),
            messages: self.messages,
            telemetry: Mutex::new(TelemetryRecorder::new()),
        })
    }
}
