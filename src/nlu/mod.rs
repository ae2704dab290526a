pub mod types;
pub mod service;
pub mod fanout;
pub mod selector;

pub use types::*;
pub use service::NluService;
pub use fanout::query_all;
pub use selector::{RankingPolicy, ScoreRanking, WinnerSelector};
