pub mod client;
pub mod keyword;

pub use client::HttpNluService;
pub use keyword::{KeywordNluService, KeywordRule};
