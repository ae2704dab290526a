use serde::{Deserialize, Serialize};

/// A value the NLU pulled out of the utterance, tagged with its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub score: Option<f32>,
}

impl Entity {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCandidate {
    pub intent: String,
    pub score: f32, // 0.0 - 1.0
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl IntentCandidate {
    pub fn new(intent: impl Into<String>, score: f32) -> Self {
        Self {
            intent: intent.into(),
            score,
            entities: Vec::new(),
        }
    }
}

/// One service's raw answer for one query. Never mutated after receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    pub query: String,
    pub candidates: Vec<IntentCandidate>,
    /// Entities reported at result level rather than per candidate.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl NluResult {
    /// Entities relevant to `candidate`: its own first, then the result-level ones.
    pub fn entities_for<'a>(&'a self, candidate: &'a IntentCandidate) -> impl Iterator<Item = &'a Entity> {
        candidate.entities.iter().chain(self.entities.iter())
    }
}

/// (result, that service's best candidate, service name). One per qualifying service.
#[derive(Debug, Clone)]
pub struct ServiceResult {
    pub result: NluResult,
    pub best: IntentCandidate,
    pub service: String,
}
