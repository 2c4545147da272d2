use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Current value of every field in a fill session, keyed by field id.
pub type FormData = Map<String, Value>;

/// Error messages per field id, in rule order.
pub type FormValidationErrors = BTreeMap<String, Vec<String>>;

/// A value the user has not actually provided: missing, `null`, or an empty
/// string.
pub fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

/// Looks up a field's value, treating unset values as absent.
pub fn provided<'a>(data: &'a FormData, field_id: &str) -> Option<&'a Value> {
    data.get(field_id).filter(|value| !is_unset(Some(value)))
}
