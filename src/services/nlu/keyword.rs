use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::nlu::service::NluService;
use crate::nlu::types::{Entity, IntentCandidate, NluResult};

/// Intent fired when any of its keywords appears as whole words.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub intent: String,
    pub keywords: Vec<String>,
    pub score: f32, // 0.0 - 1.0
}

#[derive(Debug, Clone)]
struct EntityRule {
    kind: String,
    pattern: Regex,
}

/// Offline rule-based NLU. Good enough for the console demo and tests.
///
/// heuristics:
/// - every matching keyword rule yields a candidate with the rule's score
/// - no match -> the none intent at full score
/// - entity patterns run on the original text; capture group 1 is the value
#[derive(Debug, Clone)]
pub struct KeywordNluService {
    name: String,
    none_intent: String,
    rules: Vec<KeywordRule>,
    entities: Vec<EntityRule>,
}

impl KeywordNluService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            none_intent: "None".to_string(),
            rules: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn none_intent(mut self, intent: impl Into<String>) -> Self {
        self.none_intent = intent.into();
        self
    }

    pub fn intent(mut self, intent: &str, keywords: &[&str], score: f32) -> Self {
        self.rules.push(KeywordRule {
            intent: intent.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            score,
        });
        self
    }

    /// Adds an entity pattern. Matching is case-insensitive.
    pub fn entity(mut self, kind: &str, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("(?i){}", pattern))?;
        self.entities.push(EntityRule {
            kind: kind.to_string(),
            pattern,
        });
        Ok(self)
    }

    pub fn analyze(&self, text: &str) -> NluResult {
        let mut candidates: Vec<IntentCandidate> = self
            .rules
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| contains_words(text, k)))
            .map(|rule| IntentCandidate::new(rule.intent.clone(), rule.score))
            .collect();

        if candidates.is_empty() {
            candidates.push(IntentCandidate::new(self.none_intent.clone(), 1.0));
        }

        let entities = self
            .entities
            .iter()
            .filter_map(|rule| {
                let captures = rule.pattern.captures(text)?;
                let value = captures.get(1).or_else(|| captures.get(0))?;
                Some(Entity::new(rule.kind.clone(), value.as_str().trim()))
            })
            .collect();

        NluResult {
            query: text.to_string(),
            candidates,
            entities,
        }
    }
}

/// Whole-word, case-insensitive phrase match.
fn contains_words(text: &str, phrase: &str) -> bool {
    let normalize = |w: &str| -> String {
        w.trim_matches(|c: char| c.is_ascii_punctuation() && c != '\'')
            .to_lowercase()
    };
    let words: Vec<String> = text.split_whitespace().map(normalize).filter(|w| !w.is_empty()).collect();
    let wanted: Vec<String> = phrase.split_whitespace().map(normalize).filter(|w| !w.is_empty()).collect();
    if wanted.is_empty() {
        return false;
    }
    words.windows(wanted.len()).any(|window| window == wanted.as_slice())
}

#[async_trait]
impl NluService for KeywordNluService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, text: &str, _cancel: &CancellationToken) -> Result<NluResult> {
        Ok(self.analyze(text))
    }
}
