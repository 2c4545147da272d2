use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default length bound given to freshly added `minLength`/`maxLength` rules.
pub const DEFAULT_LENGTH_BOUND: f64 = 10.0;

/// Kind tag of a validation rule.
///
/// Tags this crate does not know are kept verbatim in [`RuleKind::Other`] so
/// that stored forms round-trip; the evaluator ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    Required,
    MinLength,
    MaxLength,
    Email,
    Password,
    Min,
    Max,
    Other(String),
}

impl RuleKind {
    /// Tag used in the stored representation.
    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::Required => "required",
            RuleKind::MinLength => "minLength",
            RuleKind::MaxLength => "maxLength",
            RuleKind::Email => "email",
            RuleKind::Password => "password",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
            RuleKind::Other(tag) => tag,
        }
    }

    /// Whether the rule needs a numeric `value` to mean anything.
    pub fn takes_value(&self) -> bool {
        matches!(
            self,
            RuleKind::MinLength | RuleKind::MaxLength | RuleKind::Min | RuleKind::Max
        )
    }

    /// The kinds a form editor can offer.
    pub fn known() -> [RuleKind; 7] {
        [
            RuleKind::Required,
            RuleKind::MinLength,
            RuleKind::MaxLength,
            RuleKind::Email,
            RuleKind::Password,
            RuleKind::Min,
            RuleKind::Max,
        ]
    }
}

impl From<String> for RuleKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "required" => RuleKind::Required,
            "minLength" => RuleKind::MinLength,
            "maxLength" => RuleKind::MaxLength,
            "email" => RuleKind::Email,
            "password" => RuleKind::Password,
            "min" => RuleKind::Min,
            "max" => RuleKind::Max,
            _ => RuleKind::Other(tag),
        }
    }
}

impl From<&str> for RuleKind {
    fn from(tag: &str) -> Self {
        RuleKind::from(tag.to_string())
    }
}

impl From<RuleKind> for String {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named constraint attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Custom message; an empty string falls back to the rule's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRule {
    /// A rule with the editor defaults: length rules start at
    /// [`DEFAULT_LENGTH_BOUND`], everything else without a value.
    pub fn new(kind: RuleKind) -> Self {
        let value = match kind {
            RuleKind::MinLength | RuleKind::MaxLength => Some(DEFAULT_LENGTH_BOUND),
            _ => None,
        };
        Self {
            kind,
            value,
            message: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The custom message when one is set and non-empty.
    pub fn custom_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|message| !message.is_empty())
    }
}
