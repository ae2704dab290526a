pub mod config;
pub mod error;
pub mod nlu;
pub mod actions;
pub mod kernel;
pub mod services;
pub mod demo;

// Re-export specific items for convenient access
pub use config::EngineConfig;
pub use error::{FlowError, FlowResult};
pub use kernel::dialog::{ActionDialog, TurnOutcome};
pub use kernel::runtime::DialogRuntime;
pub use kernel::session::DialogSession;
