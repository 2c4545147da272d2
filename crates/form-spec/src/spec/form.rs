use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::field::FormField;

/// A saved or in-progress form definition.
///
/// `fields` is authoritative for ordering; every field's `order` equals its
/// position after any mutation made through this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    pub created_at: DateTime<Utc>,
}

impl FormSchema {
    /// An empty, unnamed form with a fresh id stamped now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            fields: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.id == id)
    }

    /// Fields that list `field_id` as a parent, in form order.
    pub fn dependents_of(&self, field_id: &str) -> Vec<&FormField> {
        self.fields
            .iter()
            .filter(|field| field.depends_on(field_id))
            .collect()
    }

    /// Name for display, `Untitled Form` when blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Untitled Form"
        } else {
            &self.name
        }
    }

    /// Rewrites every `order` to match the field's index.
    pub fn renumber(&mut self) {
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.order = index;
        }
    }

    /// JSON schema of the stored collection format.
    pub fn json_schema() -> Value {
        schemars::schema_for!(Vec<FormSchema>).to_value()
    }
}
