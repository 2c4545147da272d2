//! Derived field values.
//!
//! A derived field names its inputs in `parent_fields` and picks a computation
//! through its formula tag. Tags are matched against a closed set of
//! [`Formula`] kinds; anything that cannot be computed keeps the field's
//! current (or default) value instead of failing.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::data::{FormData, provided};
use crate::spec::field::{FieldType, FormField};

/// Computations a derived field can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    /// Whole years elapsed since the first `date` parent.
    AgeFromDob,
    /// A tag no computation is registered for.
    Unrecognized,
}

impl Formula {
    /// Classifies a formula tag. Matching is case-insensitive; a tag mentioning
    /// both `age` and `dob` selects [`Formula::AgeFromDob`]. Blank tags yield
    /// `None`.
    pub fn parse(tag: &str) -> Option<Formula> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return None;
        }
        if tag.contains("age") && tag.contains("dob") {
            Some(Formula::AgeFromDob)
        } else {
            Some(Formula::Unrecognized)
        }
    }
}

/// Computes the value of `field` as of today's local date.
///
/// The result is only meaningful for the instant it was computed; callers
/// must not cache it across a date boundary.
pub fn resolve(field: &FormField, data: &FormData, fields: &[FormField]) -> Value {
    resolve_on(field, data, fields, Local::now().date_naive())
}

/// [`resolve`] with an explicit current date.
pub fn resolve_on(
    field: &FormField,
    data: &FormData,
    fields: &[FormField],
    today: NaiveDate,
) -> Value {
    let computed = match field.formula() {
        Some(Formula::AgeFromDob) => age_from_dob(field, data, fields, today),
        Some(Formula::Unrecognized) => {
            tracing::debug!(
                field = %field.id,
                formula = field.formula.as_deref().unwrap_or_default(),
                "unrecognized formula; keeping current value"
            );
            None
        }
        None => None,
    };
    computed.unwrap_or_else(|| pass_through(field, data))
}

/// The entered value when there is one, else the field's default.
pub fn pass_through(field: &FormField, data: &FormData) -> Value {
    provided(data, &field.id)
        .cloned()
        .unwrap_or_else(|| field.default_value.clone())
}

/// Completed birthdays between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years - 1
    } else {
        years
    }
}

/// Reads a date from a field value: `YYYY-MM-DD`, an RFC 3339 timestamp, or a
/// local `YYYY-MM-DDTHH:MM[:SS]` datetime.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|stamp| stamp.date())
}

fn age_from_dob(
    field: &FormField,
    data: &FormData,
    fields: &[FormField],
    today: NaiveDate,
) -> Option<Value> {
    let dob_id = field.parent_fields.iter().find(|parent_id| {
        fields
            .iter()
            .any(|candidate| &candidate.id == *parent_id && candidate.kind == FieldType::Date)
    })?;
    let raw = provided(data, dob_id)?;
    match parse_date(raw) {
        Some(dob) => Some(Value::from(age_on(dob, today))),
        None => {
            tracing::debug!(
                field = %field.id,
                parent = %dob_id,
                "unreadable date; keeping current value"
            );
            None
        }
    }
}
