use std::collections::VecDeque;
use super::event::{SwitchKind, TelemetryEvent};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub turns_with_winner: u64,
    pub turns_without_winner: u64,
    pub no_action: u64,
    pub context_rejections: u64,
    pub prompts: u64,
    pub switches: SwitchStats,
    pub root_changes: u64,
    pub dispatched: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchStats {
    pub nested: u64,
    pub replaced: u64,
    pub confirm_requested: u64,
    pub declined: u64,
    pub refused: u64,
}

#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut snap = TelemetrySnapshot::default();

        for event in &self.buffer {
            match event {
                TelemetryEvent::WinnerSelected { .. } => snap.turns_with_winner += 1,
                TelemetryEvent::NoWinner => snap.turns_without_winner += 1,
                TelemetryEvent::ActionResolved { .. } => {}
                TelemetryEvent::NoActionDetected => snap.no_action += 1,
                TelemetryEvent::ContextRejected { .. } => snap.context_rejections += 1,
                TelemetryEvent::PromptPosted { .. } => snap.prompts += 1,
                TelemetryEvent::ContextSwitch { kind, .. } => match kind {
                    SwitchKind::Nested => snap.switches.nested += 1,
                    SwitchKind::Replaced => snap.switches.replaced += 1,
                    SwitchKind::ConfirmRequested => snap.switches.confirm_requested += 1,
                    SwitchKind::Declined => snap.switches.declined += 1,
                    SwitchKind::Refused => snap.switches.refused += 1,
                },
                TelemetryEvent::RootChange { .. } => snap.root_changes += 1,
                TelemetryEvent::Dispatched { .. } => snap.dispatched += 1,
            }
        }

        snap
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
