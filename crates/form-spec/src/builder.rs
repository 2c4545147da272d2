use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::engine::EngineError;
use crate::spec::field::{FieldType, FormField};
use crate::spec::form::FormSchema;
use crate::spec::rule::ValidationRule;

/// Moves the field at `from` to `to` and renumbers every `order` densely.
///
/// Both indices must address an existing field; otherwise nothing changes.
pub fn reorder_fields(
    fields: &mut Vec<FormField>,
    from: usize,
    to: usize,
) -> Result<(), EngineError> {
    let len = fields.len();
    for index in [from, to] {
        if index >= len {
            return Err(EngineError::IndexOutOfRange { index, len });
        }
    }
    let moved = fields.remove(from);
    fields.insert(to, moved);
    for (index, field) in fields.iter_mut().enumerate() {
        field.order = index;
    }
    Ok(())
}

/// Partial update of a field; `None` leaves the attribute untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Vec<ValidationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_derived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_fields: Option<Vec<String>>,
    /// `Some(None)` (an explicit `null`) clears the formula.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub formula: Option<Option<String>>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// The editing session's in-progress form.
///
/// Owns its own copy of the schema; a form loaded from the saved collection
/// is cloned so edits never reach the saved entry until it is saved again.
#[derive(Debug, Clone)]
pub struct FormBuilder {
    schema: FormSchema,
    dirty: bool,
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBuilder {
    pub fn new() -> Self {
        Self {
            schema: FormSchema::new(""),
            dirty: false,
        }
    }

    pub fn from_saved(saved: &FormSchema) -> Self {
        Self {
            schema: saved.clone(),
            dirty: false,
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.schema.name = name.into();
        self.dirty = true;
    }

    /// Appends `field` at the end of the form and returns its id.
    pub fn add_field(&mut self, mut field: FormField) -> Result<String, EngineError> {
        if self.schema.field(&field.id).is_some() {
            return Err(EngineError::DuplicateField(field.id));
        }
        self.check_parents(&field.id, &field.parent_fields)?;
        dedup_in_place(&mut field.parent_fields);
        field.order = self.schema.fields.len();
        let id = field.id.clone();
        self.schema.fields.push(field);
        self.dirty = true;
        Ok(id)
    }

    pub fn update_field(&mut self, id: &str, patch: FieldPatch) -> Result<(), EngineError> {
        let index = self
            .schema
            .position(id)
            .ok_or_else(|| EngineError::UnknownField(id.to_string()))?;
        if let Some(parents) = &patch.parent_fields {
            self.check_parents(id, parents)?;
        }

        let field = &mut self.schema.fields[index];
        if let Some(kind) = patch.kind {
            field.kind = kind;
        }
        if let Some(label) = patch.label {
            field.label = label;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(default_value) = patch.default_value {
            field.default_value = default_value;
        }
        if let Some(rules) = patch.validation_rules {
            field.validation_rules = rules;
        }
        if let Some(options) = patch.options {
            field.options = options;
        }
        if let Some(is_derived) = patch.is_derived {
            field.is_derived = is_derived;
        }
        if let Some(mut parents) = patch.parent_fields {
            dedup_in_place(&mut parents);
            field.parent_fields = parents;
        }
        if let Some(formula) = patch.formula {
            field.formula = formula;
        }
        self.dirty = true;
        Ok(())
    }

    /// Removes a field, renumbers the rest, and drops it from every other
    /// field's parent list.
    pub fn remove_field(&mut self, id: &str) -> Result<FormField, EngineError> {
        let index = self
            .schema
            .position(id)
            .ok_or_else(|| EngineError::UnknownField(id.to_string()))?;
        let removed = self.schema.fields.remove(index);
        for field in &mut self.schema.fields {
            field.parent_fields.retain(|parent| parent != id);
        }
        self.schema.renumber();
        self.dirty = true;
        Ok(removed)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), EngineError> {
        reorder_fields(&mut self.schema.fields, from, to)?;
        self.dirty = true;
        Ok(())
    }

    /// Starts over with a brand-new empty form.
    pub fn clear(&mut self) {
        self.schema = FormSchema::new("");
        self.dirty = false;
    }

    /// Copy of the form ready to hand to the saved collection: name trimmed,
    /// refused when the name is blank or there are no fields.
    pub fn snapshot_for_save(&self) -> Result<FormSchema, EngineError> {
        let name = self.schema.name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName);
        }
        if self.schema.fields.is_empty() {
            return Err(EngineError::NoFields);
        }
        let mut snapshot = self.schema.clone();
        snapshot.name = name.to_string();
        Ok(snapshot)
    }

    fn check_parents(&self, id: &str, parents: &[String]) -> Result<(), EngineError> {
        for parent in parents {
            if parent == id {
                return Err(EngineError::SelfParent(id.to_string()));
            }
            if self.schema.field(parent).is_none() {
                return Err(EngineError::UnknownField(parent.clone()));
            }
        }
        Ok(())
    }
}

fn dedup_in_place(ids: &mut Vec<String>) {
    let mut seen = std::collections::BTreeSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder_with(ids: &[&str]) -> FormBuilder {
        let mut builder = FormBuilder::new();
        for id in ids {
            builder
                .add_field(FormField::with_id(*id, FieldType::Text))
                .expect("add");
        }
        builder
    }

    fn layout(builder: &FormBuilder) -> Vec<(&str, usize)> {
        builder
            .schema()
            .fields
            .iter()
            .map(|field| (field.id.as_str(), field.order))
            .collect()
    }

    #[test]
    fn add_field_assigns_next_order() {
        let builder = builder_with(&["a", "b"]);
        assert_eq!(layout(&builder), [("a", 0), ("b", 1)]);
        assert!(builder.is_dirty());
    }

    #[test]
    fn reorder_moves_forward() {
        let mut builder = builder_with(&["a", "b", "c", "d"]);
        builder.reorder(0, 2).expect("reorder");
        assert_eq!(
            layout(&builder),
            [
                ("b", 0),
                ("c", 1),
                ("a", 2),
                ("d", 3)
            ]
        );
    }

    #[test]
    fn reorder_moves_backward() {
        let mut builder = builder_with(&["a", "b", "c"]);
        builder.reorder(2, 0).expect("reorder");
        assert_eq!(
            layout(&builder),
            [("c", 0), ("a", 1), ("b", 2)]
        );
    }

    #[test]
    fn reorder_in_place_is_a_no_op() {
        let mut builder = builder_with(&["a", "b", "c"]);
        let before = builder.schema().clone();
        builder.reorder(1, 1).expect("reorder");
        assert_eq!(builder.schema(), &before);
    }

    #[test]
    fn reorder_out_of_range_leaves_fields_alone() {
        let mut builder = builder_with(&["a", "b"]);
        builder.mark_clean();
        let before = builder.schema().clone();
        assert_eq!(
            builder.reorder(0, 2),
            Err(EngineError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            builder.reorder(5, 0),
            Err(EngineError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(builder.schema(), &before);
        assert!(!builder.is_dirty());
    }

    #[test]
    fn remove_field_renumbers_and_unlinks_parents() {
        let mut builder = builder_with(&["dob", "name"]);
        let mut age = FormField::with_id("age", FieldType::Number);
        age.is_derived = true;
        age.parent_fields = vec!["dob".into()];
        builder.add_field(age).expect("add");

        builder.remove_field("dob").expect("remove");
        assert_eq!(layout(&builder), [("name", 0), ("age", 1)]);
        let age = builder.schema().field("age").expect("age");
        assert!(age.parent_fields.is_empty());
    }

    #[test]
    fn parents_must_exist_and_not_be_self() {
        let mut builder = builder_with(&["a"]);
        let patch = FieldPatch {
            parent_fields: Some(vec!["a".into()]),
            ..FieldPatch::default()
        };
        assert_eq!(
            builder.update_field("a", patch),
            Err(EngineError::SelfParent("a".into()))
        );

        let patch = FieldPatch {
            parent_fields: Some(vec!["ghost".into()]),
            ..FieldPatch::default()
        };
        assert_eq!(
            builder.update_field("a", patch),
            Err(EngineError::UnknownField("ghost".into()))
        );
    }

    #[test]
    fn patch_updates_only_given_attributes() {
        let mut builder = builder_with(&["a", "b"]);
        let tagged = FieldPatch {
            formula: Some(Some("age from dob".into())),
            ..FieldPatch::default()
        };
        builder.update_field("a", tagged).expect("tag");
        let patch: FieldPatch = serde_json::from_value(json!({
            "label": "Email",
            "parentFields": ["b", "b"],
            "formula": null
        }))
        .expect("patch");
        builder.update_field("a", patch).expect("update");
        let field = builder.schema().field("a").expect("field");
        assert_eq!(field.label, "Email");
        assert_eq!(field.parent_fields, vec!["b".to_string()]);
        assert_eq!(field.kind, FieldType::Text);
        assert_eq!(field.formula, None);
    }

    #[test]
    fn save_snapshot_requires_name_and_fields() {
        let mut builder = FormBuilder::new();
        builder.set_name("   ");
        assert_eq!(builder.snapshot_for_save(), Err(EngineError::EmptyName));
        builder.set_name("  Signup ");
        assert_eq!(builder.snapshot_for_save(), Err(EngineError::NoFields));
        builder
            .add_field(FormField::with_id("a", FieldType::Text))
            .expect("add");
        let snapshot = builder.snapshot_for_save().expect("snapshot");
        assert_eq!(snapshot.name, "Signup");
        assert_eq!(builder.schema().name, "  Signup ");
    }

    #[test]
    fn edits_do_not_alias_saved_copy() {
        let mut saved = FormSchema::new("Saved");
        saved.fields.push(FormField::with_id("a", FieldType::Text));
        let mut builder = FormBuilder::from_saved(&saved);
        builder.set_name("Edited");
        builder.remove_field("a").expect("remove");
        assert_eq!(saved.name, "Saved");
        assert_eq!(saved.fields.len(), 1);
    }
}
