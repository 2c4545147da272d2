use form_spec::{FormData, FormField, FormSchema, Submission};
use serde_json::Value;

use crate::prompt::AnswerParseError;

/// Controls which bits of state the preview prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts and messages only.
    Clean,
    /// Verbose output: derived recomputations and the full data snapshot.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints the preview session as the user fills a form.
pub struct PreviewPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl PreviewPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, schema: &FormSchema) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", schema.display_name());
        if self.verbosity.is_verbose() {
            println!("Fields: {}", schema.fields.len());
        }
        self.header_printed = true;
    }

    pub fn show_prompt(&self, index: usize, total: usize, field: &FormField) {
        let mut line = format!("{}/{} {} ({})", index, total, field.display_label(), field.kind);
        if field.required {
            line.push_str(" *");
        }
        println!("{}", line);
        if !field.options.is_empty() && field.kind.has_options() {
            let listed: Vec<String> = field
                .options
                .iter()
                .enumerate()
                .map(|(position, option)| format!("{}) {}", position + 1, option))
                .collect();
            println!("Options: {}", listed.join("  "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_field_errors(&self, messages: &[String]) {
        for message in messages {
            eprintln!("  ! {}", message);
        }
    }

    /// Lists derived fields whose value moved after an edit.
    pub fn show_derived(&self, schema: &FormSchema, before: &FormData, after: &FormData) {
        for field in schema.fields.iter().filter(|field| field.is_derived) {
            let old = before.get(&field.id);
            let new = after.get(&field.id);
            if old != new || self.verbosity.is_verbose() {
                println!(
                    "  = {}: {}",
                    field.display_label(),
                    new.map(display_value).unwrap_or_default()
                );
            }
        }
    }

    pub fn show_submission(&self, schema: &FormSchema, submission: &Submission) {
        if submission.accepted {
            println!("Submitted ✅");
            if let Ok(pretty) = serde_json::to_string_pretty(&submission.data) {
                println!("{}", pretty);
            }
            return;
        }
        println!("Please fix the validation errors before submitting.");
        for (field_id, messages) in &submission.errors {
            let label = schema
                .field(field_id)
                .map(FormField::display_label)
                .unwrap_or(field_id.as_str());
            for message in messages {
                println!("  {} - {}", label, message);
            }
        }
    }
}

/// Text shown for a value in prompts and summaries.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
