use thiserror::Error;

/// Failures that abort a turn, plus eager configuration errors.
///
/// Context conflicts (incompatible contextual actions, refused switches) are
/// NOT errors. They are posted to the user and the flow carries on.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("no winning intent selected from NLU results")]
    NoWinningIntent,

    #[error("no handler registered for intent '{0}' and no default handler")]
    NoHandler(String),

    #[error("action for intent '{0}' still has missing parameters")]
    IncompleteAction(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("NLU service '{service}' failed: {source}")]
    Nlu {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("turn cancelled")]
    Cancelled,

    #[error("unknown NLU service '{0}'")]
    UnknownService(String),

    #[error("fulfillment of '{intent}' failed: {source}")]
    Fulfillment {
        intent: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

pub type FlowResult<T> = Result<T, FlowError>;
