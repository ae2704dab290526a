pub mod types;
pub mod registry;
pub mod extract;

pub use types::*;
pub use registry::{ActionBehavior, ActionRegistry, ActionRegistryBuilder, ApplyToContext, FnBehavior};
pub use extract::{Extraction, NluValueExtractor, ValueExtractor};
