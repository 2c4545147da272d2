use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::data::{FormData, FormValidationErrors};
use crate::spec::form::FormSchema;
use crate::spec::rule::{RuleKind, ValidationRule};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

/// Runs `rules` in declared order against a single value.
///
/// Every failing rule contributes exactly one message: its custom message when
/// set, otherwise the rule's default text. Rules of an unknown kind are logged
/// and skipped.
pub fn evaluate(value: Option<&Value>, rules: &[ValidationRule]) -> Vec<String> {
    rules
        .iter()
        .filter_map(|rule| {
            let failure = check_rule(value, rule)?;
            Some(
                rule.custom_message()
                    .map(str::to_string)
                    .unwrap_or(failure),
            )
        })
        .collect()
}

/// Evaluates every field of `schema` against `data`.
///
/// Only fields with at least one message appear in the result.
pub fn validate_form(schema: &FormSchema, data: &FormData) -> FormValidationErrors {
    schema
        .fields
        .iter()
        .filter_map(|field| {
            let messages = evaluate(data.get(&field.id), &field.validation_rules);
            (!messages.is_empty()).then(|| (field.id.clone(), messages))
        })
        .collect()
}

/// A form may be submitted once no field carries an error.
pub fn is_submittable(errors: &FormValidationErrors) -> bool {
    errors.values().all(Vec::is_empty)
}

fn check_rule(value: Option<&Value>, rule: &ValidationRule) -> Option<String> {
    match &rule.kind {
        RuleKind::Required => {
            is_missing(value).then(|| "This field is required".to_string())
        }
        RuleKind::MinLength => {
            let text = non_empty_text(value)?;
            let bound = rule.value?;
            ((code_units(text) as f64) < bound)
                .then(|| format!("Minimum length is {} characters", bound))
        }
        RuleKind::MaxLength => {
            let text = non_empty_text(value)?;
            let bound = rule.value?;
            ((code_units(text) as f64) > bound)
                .then(|| format!("Maximum length is {} characters", bound))
        }
        RuleKind::Email => {
            let text = non_empty_text(value)?;
            let valid = EMAIL.as_ref().is_some_and(|regex| regex.is_match(text));
            (!valid).then(|| "Please enter a valid email address".to_string())
        }
        RuleKind::Password => {
            let text = non_empty_text(value)?;
            if code_units(text) < MIN_PASSWORD_LEN {
                Some("Password must be at least 8 characters long".to_string())
            } else if !text.chars().any(|ch| ch.is_ascii_digit()) {
                Some("Password must contain at least one number".to_string())
            } else {
                None
            }
        }
        RuleKind::Min => {
            let number = coerce_number(value)?;
            let bound = rule.value?;
            (number < bound).then(|| format!("Minimum value is {}", bound))
        }
        RuleKind::Max => {
            let number = coerce_number(value)?;
            let bound = rule.value?;
            (number > bound).then(|| format!("Maximum value is {}", bound))
        }
        RuleKind::Other(tag) => {
            tracing::warn!(rule = %tag, "unknown validation rule type; skipping");
            None
        }
    }
}

/// Absent, `null`, an unticked checkbox, or blank text.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// Length as counted by UTF-16 based form inputs.
fn code_units(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Numeric reading of a field value for range rules.
///
/// `None` means the rule does not apply: the value is unset or does not read
/// as a number. Blank text reads as zero, like a browser number coercion.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Null => return None,
        Value::Number(number) => number.as_f64()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::String(text) if text.is_empty() => return None,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                parse_decimal(trimmed)?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    (!number.is_nan()).then_some(number)
}

/// Decimal and exponent notation only; `0x`/`0b`/`0o` literals are not
/// numbers here and leave range rules inert.
fn parse_decimal(text: &str) -> Option<f64> {
    match text {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ if text.chars().any(|ch| ch.is_ascii_alphabetic() && !matches!(ch, 'e' | 'E')) => None,
        _ => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(kind: RuleKind, value: Option<f64>) -> ValidationRule {
        ValidationRule {
            kind,
            value,
            message: None,
        }
    }

    #[test]
    fn coerce_number_reads_numeric_text() {
        assert_eq!(coerce_number(Some(&json!(" 12.5 "))), Some(12.5));
        assert_eq!(coerce_number(Some(&json!("1e3"))), Some(1000.0));
        assert_eq!(coerce_number(Some(&json!("   "))), Some(0.0));
        assert_eq!(coerce_number(Some(&json!(true))), Some(1.0));
        assert_eq!(coerce_number(Some(&json!("abc"))), None);
        assert_eq!(coerce_number(Some(&json!("NaN"))), None);
        assert_eq!(coerce_number(Some(&json!("inf"))), None);
        assert_eq!(coerce_number(Some(&json!(""))), None);
        assert_eq!(coerce_number(Some(&json!("0x1F"))), None);
        assert_eq!(coerce_number(Some(&json!("0b101"))), None);
        assert_eq!(coerce_number(None), None);
    }

    #[test]
    fn length_counts_utf16_units() {
        let rules = [rule(RuleKind::MaxLength, Some(1.0))];
        assert_eq!(
            evaluate(Some(&json!("😀")), &rules),
            vec!["Maximum length is 1 characters"]
        );
        assert!(evaluate(Some(&json!("é")), &rules).is_empty());
    }

    #[test]
    fn length_rule_without_bound_is_inert() {
        let rules = [rule(RuleKind::MinLength, None)];
        assert!(evaluate(Some(&json!("ab")), &rules).is_empty());
    }

    #[test]
    fn unticked_checkbox_is_missing() {
        let rules = [rule(RuleKind::Required, None)];
        assert_eq!(evaluate(Some(&json!(false)), &rules).len(), 1);
        assert!(evaluate(Some(&json!(true)), &rules).is_empty());
        assert!(evaluate(Some(&json!(0)), &rules).is_empty());
    }

    #[test]
    fn fractional_bounds_keep_their_digits() {
        let rules = [rule(RuleKind::Min, Some(2.5))];
        assert_eq!(evaluate(Some(&json!(1)), &rules), vec!["Minimum value is 2.5"]);
    }
}
