use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::data::{FormData, FormValidationErrors};
use crate::derive::resolve_on;
use crate::spec::field::FormField;
use crate::spec::form::FormSchema;
use crate::validate::{evaluate, is_submittable, validate_form};

/// Structural requests the engine refuses to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("field '{0}' does not exist in this form")]
    UnknownField(String),
    #[error("index {index} is out of range for {len} fields")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("field '{0}' already exists in this form")]
    DuplicateField(String),
    #[error("field '{0}' cannot be its own parent")]
    SelfParent(String),
    #[error("form name must not be empty")]
    EmptyName,
    #[error("form has no fields")]
    NoFields,
}

/// How far a change travels through derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Recompute only fields that list the changed field as a parent.
    #[default]
    Direct,
    /// Recompute everything downstream, parents before children.
    Transitive,
}

/// Per-call engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationOptions {
    #[serde(default)]
    pub propagation: Propagation,
    /// Date used by date-based formulas; `None` reads the local clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

impl EvaluationOptions {
    pub fn transitive() -> Self {
        Self {
            propagation: Propagation::Transitive,
            today: None,
        }
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The configured date, or today's local date.
    pub fn current_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Snapshot of a fill session, owned by the caller and threaded through the
/// engine functions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormState {
    #[serde(default)]
    pub data: FormData,
    #[serde(default)]
    pub errors: FormValidationErrors,
}

/// Outcome of a full-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub accepted: bool,
    pub errors: FormValidationErrors,
    pub data: FormData,
}

/// Fresh session state: every field at its default, derived fields computed
/// once, no errors shown yet.
pub fn initial_state(schema: &FormSchema, options: &EvaluationOptions) -> FormState {
    let mut data: FormData = schema
        .fields
        .iter()
        .map(|field| (field.id.clone(), field.default_value.clone()))
        .collect();
    let today = options.current_date();
    let derived: Vec<&FormField> = schema.fields.iter().filter(|f| f.is_derived).collect();
    for field in recompute_order(schema, derived) {
        let value = resolve_on(field, &data, &schema.fields, today);
        data.insert(field.id.clone(), value);
    }
    FormState {
        data,
        errors: FormValidationErrors::new(),
    }
}

/// Same as [`initial_state`]; discards everything entered so far.
pub fn reset(schema: &FormSchema, options: &EvaluationOptions) -> FormState {
    initial_state(schema, options)
}

/// Applies "field `field_id` changed to `value`".
///
/// The changed field is re-validated and its dependents recomputed according
/// to `options.propagation`. Recomputed fields are not re-validated. An
/// unknown field id is rejected and `state` is left as it was.
pub fn apply_change(
    schema: &FormSchema,
    state: &FormState,
    field_id: &str,
    value: Value,
    options: &EvaluationOptions,
) -> Result<FormState, EngineError> {
    let field = schema
        .field(field_id)
        .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))?;

    let mut next = state.clone();
    let messages = evaluate(Some(&value), &field.validation_rules);
    next.data.insert(field.id.clone(), value);
    next.errors.insert(field.id.clone(), messages);

    let today = options.current_date();
    for dependent in affected_fields(schema, field_id, options.propagation) {
        let derived = resolve_on(dependent, &next.data, &schema.fields, today);
        tracing::trace!(field = %dependent.id, value = %derived, "recomputed derived field");
        next.data.insert(dependent.id.clone(), derived);
    }

    Ok(next)
}

/// Validates every field and reports whether the form may be submitted.
pub fn submit(schema: &FormSchema, state: &FormState) -> Submission {
    let errors = validate_form(schema, &state.data);
    Submission {
        accepted: is_submittable(&errors),
        errors,
        data: state.data.clone(),
    }
}

/// Derived fields to recompute after `changed` changes, in application order.
pub fn affected_fields<'a>(
    schema: &'a FormSchema,
    changed: &str,
    propagation: Propagation,
) -> Vec<&'a FormField> {
    match propagation {
        Propagation::Direct => schema.dependents_of(changed),
        Propagation::Transitive => {
            let downstream = downstream_of(schema, changed);
            let members = schema
                .fields
                .iter()
                .filter(|field| downstream.contains(field.id.as_str()))
                .collect();
            recompute_order(schema, members)
        }
    }
}

/// Every derived field reachable from `changed` through parent links.
fn downstream_of<'a>(schema: &'a FormSchema, changed: &str) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([changed.to_string()]);
    while let Some(current) = queue.pop_front() {
        for dependent in schema.dependents_of(&current) {
            if seen.insert(dependent.id.as_str()) {
                queue.push_back(dependent.id.clone());
            }
        }
    }
    seen
}

/// Orders `members` so that parents come before the fields derived from them,
/// breaking ties by form order. Fields caught in a dependency cycle are left
/// out.
fn recompute_order<'a>(schema: &FormSchema, members: Vec<&'a FormField>) -> Vec<&'a FormField> {
    let (ordered, cyclic) = topological_split(members);
    if !cyclic.is_empty() {
        let fields: Vec<&str> = cyclic.iter().map(|field| field.id.as_str()).collect();
        tracing::warn!(
            form = %schema.id,
            fields = ?fields,
            "derived fields form a cycle; not recomputed"
        );
    }
    ordered
}

/// Splits `members` into a parents-first order and the fields that cannot be
/// ordered because they sit on, or behind, a cycle.
pub(crate) fn topological_split(
    members: Vec<&FormField>,
) -> (Vec<&FormField>, Vec<&FormField>) {
    let ids: BTreeSet<&str> = members.iter().map(|field| field.id.as_str()).collect();
    let mut pending: BTreeMap<&str, usize> = members
        .iter()
        .map(|field| {
            let inbound = field
                .parent_fields
                .iter()
                .map(String::as_str)
                .filter(|parent| ids.contains(parent) && *parent != field.id)
                .collect::<BTreeSet<_>>()
                .len();
            (field.id.as_str(), inbound)
        })
        .collect();

    let mut ordered = Vec::with_capacity(members.len());
    let mut remaining = members;
    while let Some(index) = remaining
        .iter()
        .position(|field| pending.get(field.id.as_str()) == Some(&0))
    {
        let ready = remaining.remove(index);
        for child in &remaining {
            if child.parent_fields.iter().any(|parent| parent == &ready.id)
                && let Some(count) = pending.get_mut(child.id.as_str())
            {
                *count = count.saturating_sub(1);
            }
        }
        ordered.push(ready);
    }
    (ordered, remaining)
}
