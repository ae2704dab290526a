use serde::{Deserialize, Serialize};

// Allowed: intent, parameter and service names, counts, enums
// Forbidden: utterance text, entity values, prompt text

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    WinnerSelected {
        service: String,
        intent: String,
    },

    NoWinner,

    ActionResolved {
        intent: String,
        chain_len: usize,
    },

    NoActionDetected,

    ContextRejected {
        intent: String,
    },

    PromptPosted {
        intent: String,
        parameter: String,
    },

    ContextSwitch {
        from: String,
        to: String,
        kind: SwitchKind,
    },

    RootChange {
        intent: String,
    },

    Dispatched {
        intent: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchKind {
    /// A contextual child was started inside the current action.
    Nested,
    /// The current action was replaced in place.
    Replaced,
    /// The user was asked to confirm.
    ConfirmRequested,
    /// The user declined; the current action carries on.
    Declined,
    /// The switch was refused because of an incompatible context.
    Refused,
}
