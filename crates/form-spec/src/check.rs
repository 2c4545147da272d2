use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::topological_split;
use crate::spec::field::FormField;
use crate::spec::form::FormSchema;
use crate::spec::rule::RuleKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The form breaks a structural invariant.
    Error,
    /// The form is usable but something will not behave as its author expects.
    Warning,
}

/// A structural problem found in a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl SchemaIssue {
    fn error(field: Option<&FormField>, code: &str, message: String) -> Self {
        Self::new(Severity::Error, field, code, message)
    }

    fn warning(field: Option<&FormField>, code: &str, message: String) -> Self {
        Self::new(Severity::Warning, field, code, message)
    }

    fn new(severity: Severity, field: Option<&FormField>, code: &str, message: String) -> Self {
        Self {
            severity,
            field_id: field.map(|field| field.id.clone()),
            code: code.into(),
            message,
        }
    }
}

/// Whether any issue is severe enough to refuse the form.
pub fn has_errors(issues: &[SchemaIssue]) -> bool {
    issues
        .iter()
        .any(|issue| issue.severity == Severity::Error)
}

impl FormSchema {
    /// Lists every structural problem in the form, errors and warnings mixed,
    /// in field order.
    pub fn check(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();

        for (index, field) in self.fields.iter().enumerate() {
            if !seen.insert(field.id.as_str()) {
                issues.push(SchemaIssue::error(
                    Some(field),
                    "duplicate_id",
                    format!("field id '{}' is used more than once", field.id),
                ));
            }
            if field.order != index {
                issues.push(SchemaIssue::error(
                    Some(field),
                    "order_mismatch",
                    format!("field is at position {} but has order {}", index, field.order),
                ));
            }
            check_parents(self, field, &mut issues);
            check_extras(field, &mut issues);
        }

        let derived: Vec<&FormField> = self.fields.iter().filter(|f| f.is_derived).collect();
        let (_, cyclic) = topological_split(derived);
        for field in cyclic {
            issues.push(SchemaIssue::error(
                Some(field),
                "dependency_cycle",
                "derived field depends on itself through its parents".into(),
            ));
        }

        issues
    }
}

fn check_parents(schema: &FormSchema, field: &FormField, issues: &mut Vec<SchemaIssue>) {
    for parent in &field.parent_fields {
        if parent == &field.id {
            issues.push(SchemaIssue::error(
                Some(field),
                "self_parent",
                "field lists itself as a parent".into(),
            ));
        } else if schema.field(parent).is_none() {
            issues.push(SchemaIssue::error(
                Some(field),
                "unknown_parent",
                format!("parent field '{}' does not exist", parent),
            ));
        }
    }

    if field.is_derived && field.parent_fields.is_empty() {
        issues.push(SchemaIssue::warning(
            Some(field),
            "derived_without_parents",
            "derived field has no parents and will keep its default value".into(),
        ));
    }
    if field.is_derived && field.formula.as_deref().is_none_or(|tag| tag.trim().is_empty()) {
        issues.push(SchemaIssue::warning(
            Some(field),
            "derived_without_formula",
            "derived field has no formula and will keep its default value".into(),
        ));
    }
}

fn check_extras(field: &FormField, issues: &mut Vec<SchemaIssue>) {
    if !field.options.is_empty() && !field.kind.has_options() {
        issues.push(SchemaIssue::warning(
            Some(field),
            "unused_options",
            format!("options are ignored on {} fields", field.kind),
        ));
    }

    for rule in &field.validation_rules {
        if rule.kind.takes_value() && rule.value.is_none() {
            issues.push(SchemaIssue::warning(
                Some(field),
                "rule_without_value",
                format!("{} rule has no value and never fails", rule.kind),
            ));
        }
        if let RuleKind::Other(tag) = &rule.kind {
            issues.push(SchemaIssue::warning(
                Some(field),
                "unknown_rule",
                format!("rule type '{}' is not recognized and is ignored", tag),
            ));
        }
    }
}
