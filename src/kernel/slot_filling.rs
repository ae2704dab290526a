use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::event::Outbox;
use super::telemetry::event::{SwitchKind, TelemetryEvent};
use super::telemetry::recorder::TelemetryRecorder;
use crate::actions::extract::{Extraction, ValueExtractor};
use crate::actions::registry::ActionRegistry;
use crate::actions::types::{ActionInstance, ExecutionContextEntry};
use crate::config::{Confirmation, Messages};
use crate::error::{FlowError, FlowResult};
use crate::nlu::service::NluService;

/// Everything a flow step may touch besides its own frames.
pub struct FlowContext<'a> {
    pub registry: &'a ActionRegistry,
    pub extractor: &'a dyn ValueExtractor,
    pub services: &'a [Arc<dyn NluService>],
    pub messages: &'a Messages,
    pub outbox: &'a Outbox,
    pub telemetry: &'a Mutex<TelemetryRecorder>,
    pub cancel: &'a CancellationToken,
}

impl FlowContext<'_> {
    pub fn record(&self, event: TelemetryEvent) {
        match self.telemetry.lock() {
            Ok(mut recorder) => recorder.record(event),
            Err(poisoned) => poisoned.into_inner().record(event),
        }
    }

    fn service(&self, name: &str) -> FlowResult<&Arc<dyn NluService>> {
        self.services
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| FlowError::UnknownService(name.to_string()))
    }
}

/// What the active frame is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Awaiting {
    Parameter(String),
    Confirmation,
}

/// Result of one step of the whole flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// A prompt was posted; feed the next user reply to `resume`.
    AwaitingInput,
    /// The outermost action is complete and ready for dispatch.
    Done(ExecutionContextEntry),
    /// Abandon this flow and restart at the given root.
    RootChange(ExecutionContextEntry),
}

enum FrameOutcome {
    Await,
    /// The frame's own action is complete.
    Finished,
    /// Run a nested flow for a contextual child, then come back.
    Delegate(ExecutionContextEntry),
    RootChange(ExecutionContextEntry),
}

/// One level of the nested flow: the action being filled and what it waits for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFrame {
    pub intent: String,
    pub action: ActionInstance,
    pub awaiting: Option<Awaiting>,
    /// Switch proposed mid-prompt, alive only until the yes/no reply.
    #[serde(skip)]
    overrun: Option<ExecutionContextEntry>,
}

impl QueryFrame {
    fn new(entry: ExecutionContextEntry) -> Self {
        Self {
            intent: entry.intent,
            action: entry.action,
            awaiting: None,
            overrun: None,
        }
    }

    fn into_entry(self) -> ExecutionContextEntry {
        ExecutionContextEntry::new(self.intent, self.action)
    }

    pub fn has_overrun(&self) -> bool {
        self.overrun.is_some()
    }

    /// Prompt for the first outstanding parameter, or finish.
    fn prompt_or_finish(&mut self, cx: &FlowContext<'_>) -> FlowResult<FrameOutcome> {
        let descriptor = cx.registry.descriptor_of(&self.action)?;
        let outstanding = self.action.validate(descriptor);

        match outstanding.into_iter().next() {
            Some(first) => {
                debug!("Prompting '{}' for '{}'", self.intent, first.parameter);
                cx.outbox.post(first.message);
                cx.record(TelemetryEvent::PromptPosted {
                    intent: self.intent.clone(),
                    parameter: first.parameter.clone(),
                });
                self.awaiting = Some(Awaiting::Parameter(first.parameter));
                Ok(FrameOutcome::Await)
            }
            None => {
                self.awaiting = None;
                Ok(FrameOutcome::Finished)
            }
        }
    }

    async fn on_reply(
        &mut self,
        reply: &str,
        service: &dyn NluService,
        cx: &FlowContext<'_>,
    ) -> FlowResult<FrameOutcome> {
        match self.awaiting.take() {
            Some(Awaiting::Parameter(parameter)) => self.on_parameter_reply(&parameter, reply, service, cx).await,
            Some(Awaiting::Confirmation) => self.on_confirmation(reply, cx),
            None => self.prompt_or_finish(cx),
        }
    }

    async fn on_parameter_reply(
        &mut self,
        parameter: &str,
        reply: &str,
        service: &dyn NluService,
        cx: &FlowContext<'_>,
    ) -> FlowResult<FrameOutcome> {
        let extraction = tokio::select! {
            biased;
            _ = cx.cancel.cancelled() => return Err(FlowError::Cancelled),
            extraction = cx.extractor.extract_value(service, &mut self.action, parameter, reply, cx.cancel) => extraction,
        };
        let extraction = extraction.map_err(|source| FlowError::Nlu {
            service: service.name().to_string(),
            source,
        })?;

        match extraction {
            Extraction::Bound => debug!("Bound '{}' on '{}'", parameter, self.intent),
            Extraction::Rejected => debug!("Rejected value for '{}' on '{}'", parameter, self.intent),
            Extraction::Switch { intent, action } => {
                return self.on_switch(ExecutionContextEntry::new(intent, action), cx);
            }
        }
        self.prompt_or_finish(cx)
    }

    /// The reply resolved to another action.
    fn on_switch(&mut self, proposed: ExecutionContextEntry, cx: &FlowContext<'_>) -> FlowResult<FrameOutcome> {
        let registry = cx.registry;
        let current_name = registry.friendly_name(&self.action);
        let new_name = registry.friendly_name(&proposed.action);

        if registry.is_valid_contextual_child(&proposed.action, &self.action) {
            info!("Nesting '{}' inside '{}'", proposed.intent, self.intent);
            cx.record(self.switch_event(&proposed, SwitchKind::Nested));
            return Ok(FrameOutcome::Delegate(proposed));
        }

        if registry.is_contextual(&proposed.action) && !registry.is_contextual(&self.action) {
            cx.outbox.post(cx.messages.incompatible_context(&current_name, &new_name));
            cx.record(self.switch_event(&proposed, SwitchKind::Refused));
        } else if proposed.action.action != self.action.action {
            if !registry.can_rehost(&proposed.action, &self.action) {
                cx.outbox.post(cx.messages.invalid_switch(&current_name, &new_name));
                cx.record(self.switch_event(&proposed, SwitchKind::Refused));
            } else if registry.descriptor_of(&self.action)?.confirm_on_switch {
                cx.outbox.post(cx.messages.confirm_switch(&current_name, &new_name));
                cx.record(self.switch_event(&proposed, SwitchKind::ConfirmRequested));
                self.overrun = Some(proposed);
                self.awaiting = Some(Awaiting::Confirmation);
                return Ok(FrameOutcome::Await);
            } else {
                info!("Replacing '{}' with '{}'", self.intent, proposed.intent);
                cx.record(self.switch_event(&proposed, SwitchKind::Replaced));
                self.intent = proposed.intent;
                self.action = proposed.action;
            }
        }

        self.prompt_or_finish(cx)
    }

    fn on_confirmation(&mut self, reply: &str, cx: &FlowContext<'_>) -> FlowResult<FrameOutcome> {
        let overrun = self.overrun.take();

        match (cx.messages.confirmation(reply), overrun) {
            (Confirmation::Yes, Some(proposed)) => {
                let registry = cx.registry;
                if registry.is_contextual(&self.action) && !registry.is_contextual(&proposed.action) {
                    info!("'{}' cannot stay nested, changing root", proposed.intent);
                    cx.record(TelemetryEvent::RootChange {
                        intent: proposed.intent.clone(),
                    });
                    return Ok(FrameOutcome::RootChange(proposed));
                }
                cx.record(self.switch_event(&proposed, SwitchKind::Replaced));
                self.intent = proposed.intent;
                self.action = proposed.action;
            }
            (_, proposed) => {
                let to = proposed.map(|p| p.intent).unwrap_or_default();
                cx.record(TelemetryEvent::ContextSwitch {
                    from: self.intent.clone(),
                    to,
                    kind: SwitchKind::Declined,
                });
            }
        }

        self.prompt_or_finish(cx)
    }

    /// A nested flow finished, either normally or by signalling a root change.
    async fn after_child_finished(
        &mut self,
        child: ExecutionContextEntry,
        root_change: bool,
        cx: &FlowContext<'_>,
    ) -> FlowResult<FrameOutcome> {
        let registry = cx.registry;

        if root_change {
            if !registry.is_contextual(&self.action) {
                return Ok(FrameOutcome::RootChange(child));
            }
            debug!("'{}' adopts root change to '{}'", self.intent, child.intent);
            self.intent = child.intent;
            self.action = child.action;
            return self.prompt_or_finish(cx);
        }

        let context = if registry.is_valid_contextual_child(&child.action, &self.action) {
            Some(&mut self.action)
        } else {
            None
        };
        let result = registry.fulfill(&child.action, context).await?;
        if let Some(text) = result.as_text() {
            cx.outbox.post(text);
        }

        self.prompt_or_finish(cx)
    }

    fn switch_event(&self, proposed: &ExecutionContextEntry, kind: SwitchKind) -> TelemetryEvent {
        TelemetryEvent::ContextSwitch {
            from: self.intent.clone(),
            to: proposed.intent.clone(),
            kind,
        }
    }
}

/// Interactive loop that fills missing parameters along an execution chain.
///
/// Frames are kept as an explicit stack: the bottom frame holds the outermost
/// ancestor, the top frame is the one currently prompting. A finished frame
/// hands its action to the frame below it, which fulfills it against its own
/// action and resumes prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFillingFlow {
    service: String,
    frames: Vec<QueryFrame>,
}

impl SlotFillingFlow {
    /// Starts a flow for an ancestor-first chain and runs it up to the first prompt.
    pub async fn start(
        service: impl Into<String>,
        chain: Vec<ExecutionContextEntry>,
        cx: &FlowContext<'_>,
    ) -> FlowResult<(Self, FlowStep)> {
        if chain.is_empty() {
            return Err(FlowError::Configuration("slot filling started with an empty chain".to_string()));
        }
        let mut flow = Self {
            service: service.into(),
            frames: chain.into_iter().map(QueryFrame::new).collect(),
        };
        let outcome = flow.active_mut()?.prompt_or_finish(cx)?;
        let step = flow.drive(outcome, cx).await?;
        Ok((flow, step))
    }

    /// Feeds the user's reply to the active frame.
    pub async fn resume(&mut self, reply: &str, cx: &FlowContext<'_>) -> FlowResult<FlowStep> {
        let service = cx.service(&self.service)?;
        let outcome = self.active_mut()?.on_reply(reply, service.as_ref(), cx).await?;
        self.drive(outcome, cx).await
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn active(&self) -> Option<&QueryFrame> {
        self.frames.last()
    }

    fn active_mut(&mut self) -> FlowResult<&mut QueryFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| FlowError::Configuration("slot filling flow has no frames".to_string()))
    }

    async fn drive(&mut self, mut outcome: FrameOutcome, cx: &FlowContext<'_>) -> FlowResult<FlowStep> {
        loop {
            outcome = match outcome {
                FrameOutcome::Await => return Ok(FlowStep::AwaitingInput),
                FrameOutcome::Delegate(entry) => {
                    self.frames.push(QueryFrame::new(entry));
                    self.active_mut()?.prompt_or_finish(cx)?
                }
                FrameOutcome::Finished => {
                    let entry = match self.frames.pop() {
                        Some(frame) => frame.into_entry(),
                        None => return Err(FlowError::Configuration("slot filling flow has no frames".to_string())),
                    };
                    match self.frames.last_mut() {
                        None => return Ok(FlowStep::Done(entry)),
                        Some(parent) => parent.after_child_finished(entry, false, cx).await?,
                    }
                }
                FrameOutcome::RootChange(entry) => {
                    self.frames.pop();
                    match self.frames.last_mut() {
                        None => return Ok(FlowStep::RootChange(entry)),
                        Some(parent) => parent.after_child_finished(entry, true, cx).await?,
                    }
                }
            };
        }
    }
}
