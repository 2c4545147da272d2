use std::str::FromStr;

use form_spec::{FieldType, FormBuilder, FormField, FormSchema, RuleKind, ValidationRule};

use crate::CliResult;
use crate::prompt::{
    mark_required, parse_answer, prompt_bool, prompt_line, prompt_non_empty, prompt_optional,
    split_list,
};

/// Walks the user through a new form and returns it ready to save.
pub fn author_form() -> CliResult<FormSchema> {
    println!("Interactive form builder");
    let mut builder = FormBuilder::new();
    builder.set_name(prompt_non_empty(&mark_required("Form name"), None)?);

    while let Some(label) = prompt_optional("Field label (blank to finish)")? {
        let kind = prompt_field_type()?;
        let mut field = FormField::with_id(unique_id(&builder, &label), kind);
        field.label = label;
        field.required = prompt_bool("Required?", false)?;
        if kind.has_options() {
            field.options = prompt_options()?;
        }
        field.default_value = prompt_default(&field)?;
        field.validation_rules = prompt_rules()?;
        if field.required
            && !field
                .validation_rules
                .iter()
                .any(|rule| rule.kind == RuleKind::Required)
        {
            field
                .validation_rules
                .insert(0, ValidationRule::new(RuleKind::Required));
        }
        if !builder.schema().fields.is_empty() && prompt_bool("Derived field?", false)? {
            field.is_derived = true;
            field.parent_fields = prompt_parents(&builder)?;
            field.formula = Some(prompt_non_empty("Formula (e.g. age from dob)", None)?);
        }
        let id = builder.add_field(field)?;
        println!("Added field '{}'.", id);
    }

    Ok(builder.snapshot_for_save()?)
}

/// Slug of `label`, suffixed until it does not clash with an existing id.
fn unique_id(builder: &FormBuilder, label: &str) -> String {
    let slug: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    let base = if slug.is_empty() { "field" } else { slug };
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while builder.schema().field(&candidate).is_some() {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    candidate
}

fn prompt_field_type() -> CliResult<FieldType> {
    let choices = FieldType::ALL
        .iter()
        .map(FieldType::as_str)
        .collect::<Vec<_>>()
        .join("|");
    loop {
        let value = prompt_line(&format!("Field type ({})", choices), Some("text"))?;
        match FieldType::from_str(&value) {
            Ok(kind) => return Ok(kind),
            Err(err) => println!("{}", err),
        }
    }
}

fn prompt_options() -> CliResult<Vec<String>> {
    loop {
        let options = split_list(&prompt_line("Options (comma separated)", None)?);
        if options.is_empty() {
            println!("Provide at least one option.");
            continue;
        }
        return Ok(options);
    }
}

fn prompt_default(field: &FormField) -> CliResult<serde_json::Value> {
    loop {
        let raw = prompt_line("Default value (optional)", None)?;
        match parse_answer(field, &raw) {
            Ok(value) => return Ok(value),
            Err(err) => println!("Invalid default: {}", err.user_message),
        }
    }
}

fn prompt_rules() -> CliResult<Vec<ValidationRule>> {
    loop {
        let raw = prompt_line(
            "Validation rules (e.g. minLength=3,email; blank for none)",
            None,
        )?;
        match parse_rules(&raw) {
            Ok(rules) => return Ok(rules),
            Err(err) => println!("{}", err),
        }
    }
}

fn prompt_parents(builder: &FormBuilder) -> CliResult<Vec<String>> {
    let known = builder
        .schema()
        .fields
        .iter()
        .map(|field| field.id.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    loop {
        let parents = split_list(&prompt_line(
            &format!("Parent fields (comma separated ids: {})", known),
            None,
        )?);
        match parents
            .iter()
            .find(|parent| builder.schema().field(parent).is_none())
        {
            Some(missing) => println!("Unknown field '{}'.", missing),
            None if parents.is_empty() => println!("Pick at least one parent field."),
            None => return Ok(parents),
        }
    }
}

/// Parses `kind[=value]` items separated by commas.
pub fn parse_rules(raw: &str) -> Result<Vec<ValidationRule>, String> {
    split_list(raw)
        .iter()
        .map(|item| {
            let (tag, value) = match item.split_once('=') {
                Some((tag, value)) => (tag.trim(), Some(value.trim())),
                None => (item.as_str(), None),
            };
            let kind = RuleKind::known()
                .into_iter()
                .find(|kind| kind.as_str().eq_ignore_ascii_case(tag))
                .ok_or_else(|| format!("unknown rule type '{}'", tag))?;
            let mut rule = ValidationRule::new(kind);
            match value {
                Some(value) => {
                    let number = value
                        .parse::<f64>()
                        .map_err(|_| format!("rule '{}' needs a numeric value", tag))?;
                    rule.value = Some(number);
                }
                None if rule.kind.takes_value() && rule.value.is_none() => {
                    return Err(format!("rule '{}' needs a value, e.g. {}=5", tag, tag));
                }
                None => {}
            }
            Ok(rule)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rules_reads_values() {
        let rules = parse_rules("required, minLength=3, maxlength, email").expect("rules");
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[1].kind, RuleKind::MinLength);
        assert_eq!(rules[1].value, Some(3.0));
        assert_eq!(rules[2].kind, RuleKind::MaxLength);
        assert_eq!(rules[2].value, Some(10.0));
    }

    #[test]
    fn parse_rules_rejects_unknown_or_incomplete() {
        assert!(parse_rules("zip").is_err());
        assert!(parse_rules("min").is_err());
        assert!(parse_rules("max=big").is_err());
        assert!(parse_rules("").expect("empty").is_empty());
    }

    #[test]
    fn unique_id_slugs_and_dedups() {
        let mut builder = FormBuilder::new();
        assert_eq!(unique_id(&builder, "Date of Birth"), "date_of_birth");
        builder
            .add_field(FormField::with_id("email", FieldType::Text))
            .expect("add");
        assert_eq!(unique_id(&builder, "Email"), "email_2");
        assert_eq!(unique_id(&builder, "!!"), "field");
    }
}
