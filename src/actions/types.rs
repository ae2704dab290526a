use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Static metadata for one action type. Loaded once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Primary intent bound to this action. Doubles as the action's type name.
    pub intent: String,
    /// Further intents resolving to the same action.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub friendly_name: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Present iff the action is contextual.
    #[serde(default)]
    pub context: Option<ContextSpec>,
    #[serde(default)]
    pub confirm_on_switch: bool,
}

impl ActionDescriptor {
    pub fn new(intent: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            aliases: Vec::new(),
            friendly_name: friendly_name.into(),
            params: Vec::new(),
            context: None,
            confirm_on_switch: false,
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn contextual(mut self, parent: impl Into<String>, can_start_without_context: bool) -> Self {
        self.context = Some(ContextSpec {
            parent: parent.into(),
            can_start_without_context,
        });
        self
    }

    pub fn alias(mut self, intent: impl Into<String>) -> Self {
        self.aliases.push(intent.into());
        self
    }

    pub fn confirm_on_switch(mut self) -> Self {
        self.confirm_on_switch = true;
        self
    }

    pub fn is_contextual(&self) -> bool {
        self.context.is_some()
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSpec {
    /// Intent of the action this one runs inside.
    pub parent: String,
    /// Whether a placeholder parent may be built when none exists.
    #[serde(default)]
    pub can_start_without_context: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Entity role that fills this parameter. Defaults to the parameter name.
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Posted when the value is missing.
    pub prompt: String,
    /// Posted when a value was supplied but rejected. Falls back to `prompt`.
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: None,
            kind: ValueKind::Text,
            required: true,
            prompt: prompt.into(),
            error_message: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prompt: format!("What is the {}?", name),
            name,
            entity: None,
            kind: ValueKind::Text,
            required: false,
            error_message: None,
        }
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn entity_role(&self) -> &str {
        self.entity.as_deref().unwrap_or(&self.name)
    }

    /// Converts raw text into the stored value, or `None` if it does not fit.
    pub fn convert(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match &self.kind {
            ValueKind::Text => Some(Value::String(raw.to_string())),
            ValueKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            ValueKind::Number { min, max } => {
                let n = raw.parse::<f64>().ok()?;
                if min.map_or(false, |m| n < m) || max.map_or(false, |m| n > m) {
                    return None;
                }
                Some(Value::from(n))
            }
            ValueKind::Choice(choices) => choices
                .iter()
                .find(|c| c.eq_ignore_ascii_case(raw))
                .map(|c| Value::String(c.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum ValueKind {
    #[default]
    Text,
    Integer,
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Choice(Vec<String>),
}

/// A concrete action with whatever parameters are bound so far.
///
/// Owned by exactly one flow. Switching actions replaces the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInstance {
    /// Primary intent of the descriptor this instance belongs to.
    pub action: String,
    pub params: BTreeMap<String, Value>,
    /// Raw values that failed conversion, keyed by parameter.
    #[serde(default)]
    pub rejected: BTreeMap<String, String>,
}

impl ActionInstance {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: BTreeMap::new(),
            rejected: BTreeMap::new(),
        }
    }

    pub fn get(&self, param: &str) -> Option<&Value> {
        self.params.get(param)
    }

    pub fn get_str(&self, param: &str) -> Option<&str> {
        self.params.get(param).and_then(Value::as_str)
    }

    /// Binds `raw` to `spec` if it converts. Returns whether it was stored.
    pub fn bind(&mut self, spec: &ParamSpec, raw: &str) -> bool {
        match spec.convert(raw) {
            Some(value) => {
                self.rejected.remove(&spec.name);
                self.params.insert(spec.name.clone(), value);
                true
            }
            None => {
                self.rejected.insert(spec.name.clone(), raw.to_string());
                false
            }
        }
    }

    /// Missing or rejected parameters, in declaration order.
    ///
    /// The order is stable across calls: the slot-filling loop relies on it
    /// to always prompt for the first outstanding parameter.
    pub fn validate(&self, descriptor: &ActionDescriptor) -> Vec<ValidationResult> {
        descriptor
            .params
            .iter()
            .filter(|p| p.required && !self.params.contains_key(&p.name))
            .map(|p| {
                let message = match (self.rejected.contains_key(&p.name), &p.error_message) {
                    (true, Some(error)) => error.clone(),
                    _ => p.prompt.clone(),
                };
                ValidationResult {
                    parameter: p.name.clone(),
                    message,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub parameter: String,
    pub message: String,
}

/// (intent, action) pair; a chain of these is built ancestor-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContextEntry {
    pub intent: String,
    pub action: ActionInstance,
}

impl ExecutionContextEntry {
    pub fn new(intent: impl Into<String>, action: ActionInstance) -> Self {
        Self {
            intent: intent.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FulfillResult {
    Text(String),
    Data(Value),
    Empty,
}

impl FulfillResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FulfillResult::Text(text) => Some(text),
            _ => None,
        }
    }
}
