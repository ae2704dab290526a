use std::sync::Arc;

use tracing::{debug, info};

use super::service::NluService;
use super::types::{IntentCandidate, NluResult, ServiceResult};
use crate::config::RankingConfig;

/// Picks the best candidate inside one result, and the best result across services.
pub trait RankingPolicy: Send + Sync {
    fn best_intent(&self, result: &NluResult) -> Option<IntentCandidate>;

    /// Cross-service tie-break. Must be deterministic for equal inputs.
    fn best_result(&self, results: Vec<ServiceResult>) -> Option<ServiceResult>;
}

/// Highest score wins. Ties go to the earlier entry (candidate list order,
/// then service order).
#[derive(Debug, Clone)]
pub struct ScoreRanking {
    pub min_score: f32,
    pub none_intent: String,
}

impl Default for ScoreRanking {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

impl From<&RankingConfig> for ScoreRanking {
    fn from(config: &RankingConfig) -> Self {
        Self {
            min_score: config.min_score,
            none_intent: config.none_intent.clone(),
        }
    }
}

impl RankingPolicy for ScoreRanking {
    fn best_intent(&self, result: &NluResult) -> Option<IntentCandidate> {
        let mut best: Option<&IntentCandidate> = None;
        for candidate in &result.candidates {
            if best.map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        let best = best?;

        if best.score < self.min_score || best.intent.eq_ignore_ascii_case(&self.none_intent) {
            return None;
        }
        Some(best.clone())
    }

    fn best_result(&self, results: Vec<ServiceResult>) -> Option<ServiceResult> {
        let mut best: Option<ServiceResult> = None;
        for result in results {
            let better = match &best {
                Some(b) => result.best.score > b.best.score,
                None => true,
            };
            if better {
                best = Some(result);
            }
        }
        best
    }
}

pub struct WinnerSelector {
    policy: Arc<dyn RankingPolicy>,
}

impl WinnerSelector {
    pub fn new(policy: Arc<dyn RankingPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Arc<dyn RankingPolicy> {
        &self.policy
    }

    /// `results[i]` must come from `services[i]`.
    /// Returns `None` iff no service produced a qualifying candidate.
    pub fn select(&self, services: &[Arc<dyn NluService>], results: Vec<NluResult>) -> Option<ServiceResult> {
        let mut qualifying = Vec::new();
        for (service, result) in services.iter().zip(results) {
            match self.policy.best_intent(&result) {
                Some(best) => qualifying.push(ServiceResult {
                    result,
                    best,
                    service: service.name().to_string(),
                }),
                None => debug!("Service '{}' has no qualifying intent", service.name()),
            }
        }

        let winner = self.policy.best_result(qualifying)?;
        info!(
            "Winning intent '{}' ({:.2}) from service '{}'",
            winner.best.intent, winner.best.score, winner.service
        );
        Some(winner)
    }
}
