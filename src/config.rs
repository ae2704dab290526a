use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FlowError, FlowResult};

/// Engine configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub services: Vec<ServiceConfig>,
    pub ranking: RankingConfig,
    pub messages: Messages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Candidates scoring below this never win.
    pub min_score: f32,
    /// The "nothing matched" label an NLU model emits.
    pub none_intent: String,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            none_intent: "None".to_string(),
        }
    }
}

/// User-visible notice templates.
///
/// Placeholders: `{action}` in `context_required`, `{current}` / `{new}` in the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub context_required: String,
    pub incompatible_context: String,
    pub invalid_switch: String,
    pub confirm_switch: String,
    pub no_action_detected: Option<String>,
    /// Posted by the runtime when a turn fails.
    pub turn_failed: Option<String>,
    pub yes_words: Vec<String>,
    pub no_words: Vec<String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            context_required: "Cannot start contextual action '{action}' without a valid context.".to_string(),
            incompatible_context: "Cannot execute action '{new}' in the context of '{current}' - continuing with current action".to_string(),
            invalid_switch: "Cannot switch to action '{new}' from '{current}' due to invalid context - continuing with current action".to_string(),
            confirm_switch: "Do you want to discard the current action '{current}' and start executing '{new}' action?".to_string(),
            no_action_detected: None,
            turn_failed: Some("Sorry, I could not process that.".to_string()),
            yes_words: vec!["yes".into(), "y".into(), "yep".into(), "sure".into(), "ok".into()],
            no_words: vec!["no".into(), "n".into(), "nope".into()],
        }
    }
}

/// Reply to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Unclear,
}

impl Messages {
    pub fn context_required(&self, action: &str) -> String {
        self.context_required.replace("{action}", action)
    }

    pub fn incompatible_context(&self, current: &str, new: &str) -> String {
        fill(&self.incompatible_context, current, new)
    }

    pub fn invalid_switch(&self, current: &str, new: &str) -> String {
        fill(&self.invalid_switch, current, new)
    }

    pub fn confirm_switch(&self, current: &str, new: &str) -> String {
        fill(&self.confirm_switch, current, new)
    }

    pub fn confirmation(&self, reply: &str) -> Confirmation {
        let reply = reply.trim().trim_end_matches(['.', '!']).to_lowercase();
        if self.yes_words.iter().any(|w| w.eq_ignore_ascii_case(&reply)) {
            Confirmation::Yes
        } else if self.no_words.iter().any(|w| w.eq_ignore_ascii_case(&reply)) {
            Confirmation::No
        } else {
            Confirmation::Unclear
        }
    }
}

fn fill(template: &str, current: &str, new: &str) -> String {
    template.replace("{current}", current).replace("{new}", new)
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> FlowResult<Self> {
        serde_json::from_str(raw).map_err(|e| FlowError::Configuration(format!("invalid config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_a_valid_config() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert!(config.services.is_empty());
        assert_eq!(config.ranking.none_intent, "None");
        assert_eq!(config.messages.confirmation("Yes!"), Confirmation::Yes);
    }

    #[test]
    fn service_timeout_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "services": [ { "name": "primary", "endpoint": "http://localhost:9000/query" } ],
                 "ranking": { "min_score": 0.4 } }"#,
        )
        .unwrap();
        assert_eq!(config.services[0].timeout_ms, 2000);
        assert_eq!(config.ranking.min_score, 0.4);
        assert_eq!(config.ranking.none_intent, "None");
    }

    #[test]
    fn templates_are_filled() {
        let messages = Messages::default();
        assert_eq!(
            messages.confirm_switch("Book Flight", "Cancel Flight"),
            "Do you want to discard the current action 'Book Flight' and start executing 'Cancel Flight' action?"
        );
        assert_eq!(messages.confirmation("maybe"), Confirmation::Unclear);
        assert_eq!(messages.confirmation(" no "), Confirmation::No);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(EngineConfig::from_json_str("{"), Err(FlowError::Configuration(_))));
    }
}
