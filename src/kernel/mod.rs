pub mod event;
pub mod hooks;
pub mod resolver;
pub mod slot_filling;
pub mod dispatcher;
pub mod session;
pub mod dialog;
pub mod runtime;
pub mod telemetry;
