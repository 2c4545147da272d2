use std::io::{self, Write};

use form_spec::{FieldType, FormField, parse_date};
use serde_json::{Number, Value};

use crate::CliResult;

/// Why a typed answer could not be turned into a field value.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: &str, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.to_string(),
            debug_message,
        }
    }
}

pub fn prompt_line(prompt: &str, default: Option<&str>) -> CliResult<String> {
    match default {
        Some(default_value) if !default_value.is_empty() => {
            print!("{} [{}]: ", prompt, default_value)
        }
        _ => print!("{}: ", prompt),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err("unexpected end of input".into());
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn prompt_optional(prompt: &str) -> CliResult<Option<String>> {
    let value = prompt_line(prompt, None)?;
    if value.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

pub fn prompt_non_empty(prompt: &str, default: Option<&str>) -> CliResult<String> {
    loop {
        let value = prompt_line(prompt, default)?;
        if !value.trim().is_empty() {
            return Ok(value);
        }
        println!("Value cannot be empty.");
    }
}

pub fn prompt_bool(prompt: &str, default: bool) -> CliResult<bool> {
    let prompt_text = format!("{} (y/n)", prompt.trim());
    let default_hint = if default { "Y" } else { "N" };
    loop {
        let line = prompt_line(&prompt_text, Some(default_hint))?;
        match parse_flag(&line) {
            Some(flag) => return Ok(flag),
            None => println!("Invalid answer '{}'. Expected yes or no.", line),
        }
    }
}

pub fn mark_required(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.to_lowercase().contains("required") {
        trimmed.to_string()
    } else {
        format!("{} (required)", trimmed)
    }
}

/// Comma separated list with blanks dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Interprets a typed answer according to the field's widget kind.
///
/// An empty answer clears text-like fields and leaves the engine to decide
/// whether that is acceptable.
pub fn parse_answer(field: &FormField, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(match field.kind {
            FieldType::Checkbox => Value::Bool(false),
            _ => Value::String(String::new()),
        });
    }

    match field.kind {
        FieldType::Text | FieldType::Textarea => Ok(Value::String(raw.to_string())),
        FieldType::Number => parse_number(raw),
        FieldType::Checkbox => parse_flag(raw).map(Value::Bool).ok_or_else(|| {
            AnswerParseError::new(
                "Please enter yes or no.",
                Some("expected boolean (y/n/true/false)".to_string()),
            )
        }),
        FieldType::Select | FieldType::Radio => parse_choice(field, raw),
        FieldType::Date => match parse_date(&Value::String(raw.to_string())) {
            Some(date) => Ok(Value::String(date.format("%Y-%m-%d").to_string())),
            None => Err(AnswerParseError::new(
                "Please enter a date.",
                Some("expected YYYY-MM-DD".to_string()),
            )),
        },
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(whole) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(whole)));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected a finite number".to_string()),
            )
        })
}

fn parse_choice(field: &FormField, raw: &str) -> Result<Value, AnswerParseError> {
    if field.options.is_empty() {
        return Ok(Value::String(raw.to_string()));
    }
    if let Ok(index) = raw.parse::<usize>()
        && (1..=field.options.len()).contains(&index)
    {
        return Ok(Value::String(field.options[index - 1].clone()));
    }
    field
        .options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(raw))
        .map(|option| Value::String(option.clone()))
        .ok_or_else(|| {
            AnswerParseError::new(
                "Please pick one of the listed options.",
                Some(format!("expected one of: {}", field.options.join(", "))),
            )
        })
}
