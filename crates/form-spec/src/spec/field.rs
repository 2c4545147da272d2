use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::derive::Formula;
use crate::spec::rule::ValidationRule;

/// Input widget kinds a field can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
        }
    }

    /// Only select and radio fields make use of `options`.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown field type '{}'", value))
    }
}

/// One input definition within a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default)]
    pub parent_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default)]
    pub order: usize,
}

impl FormField {
    /// A blank field of the given kind with a fresh id.
    pub fn new(kind: FieldType) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind)
    }

    pub fn with_id(id: impl Into<String>, kind: FieldType) -> Self {
        Self {
            id: id.into(),
            kind,
            label: String::new(),
            required: false,
            default_value: Value::String(String::new()),
            validation_rules: Vec::new(),
            options: Vec::new(),
            is_derived: false,
            parent_fields: Vec::new(),
            formula: None,
            order: 0,
        }
    }

    /// Parsed formula tag; `None` when the field is not derived or has no tag.
    pub fn formula(&self) -> Option<Formula> {
        if !self.is_derived {
            return None;
        }
        self.formula.as_deref().and_then(Formula::parse)
    }

    pub fn depends_on(&self, field_id: &str) -> bool {
        self.is_derived && self.parent_fields.iter().any(|parent| parent == field_id)
    }

    /// Label for display, falling back to the id for untitled fields.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}
