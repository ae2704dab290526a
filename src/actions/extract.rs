use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::registry::ActionRegistry;
use super::types::ActionInstance;
use crate::nlu::selector::RankingPolicy;
use crate::nlu::service::NluService;

/// Outcome of asking for a single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The value was bound onto the action.
    Bound,
    /// Nothing usable in the reply; the rejected raw value is recorded.
    Rejected,
    /// The reply is really a different request.
    Switch { intent: String, action: ActionInstance },
}

#[async_trait]
pub trait ValueExtractor: Send + Sync {
    async fn extract_value(
        &self,
        service: &dyn NluService,
        action: &mut ActionInstance,
        parameter: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Extraction>;
}

/// Runs the reply through the NLU: a different action wins over a value,
/// then a matching entity, then the raw text.
pub struct NluValueExtractor {
    registry: Arc<ActionRegistry>,
    ranking: Arc<dyn RankingPolicy>,
}

impl NluValueExtractor {
    pub fn new(registry: Arc<ActionRegistry>, ranking: Arc<dyn RankingPolicy>) -> Self {
        Self { registry, ranking }
    }
}

#[async_trait]
impl ValueExtractor for NluValueExtractor {
    async fn extract_value(
        &self,
        service: &dyn NluService,
        action: &mut ActionInstance,
        parameter: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Extraction> {
        let result = service.query(text, cancel).await?;

        let best = self.ranking.best_intent(&result);

        if let Some(best) = &best {
            if let Some(candidate) = self.registry.build(&best.intent, result.entities_for(best)) {
                if candidate.action != action.action {
                    debug!("Reply for '{}' resolved to '{}' instead", parameter, best.intent);
                    return Ok(Extraction::Switch {
                        intent: best.intent.clone(),
                        action: candidate,
                    });
                }
            }
        }

        let descriptor = self.registry.descriptor_of(action)?;
        let spec = descriptor
            .param_spec(parameter)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no parameter '{}'", action.action, parameter))?;

        // Winning candidate's entities, then result-level ones.
        let role = spec.entity_role();
        let entity = match &best {
            Some(best) => result.entities_for(best).find(|e| e.kind.eq_ignore_ascii_case(role)),
            None => result.entities.iter().find(|e| e.kind.eq_ignore_ascii_case(role)),
        };
        let raw = entity.map(|e| e.value.as_str()).unwrap_or(text);

        if action.bind(spec, raw) {
            Ok(Extraction::Bound)
        } else {
            Ok(Extraction::Rejected)
        }
    }
}
