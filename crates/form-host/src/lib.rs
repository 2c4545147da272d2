use serde_json::{Map, Value, json};
use thiserror::Error;

use form_spec::{
    EngineError, EvaluationOptions, FormSchema, FormState, MemoryStore, SavedForms, apply_change,
    has_errors, initial_state, reorder_fields, resolve_on, submit as submit_form,
};

#[derive(Debug, Error)]
enum HostError {
    #[error("failed to parse form schema: {0}")]
    SchemaParse(#[source] serde_json::Error),
    #[error("failed to parse {what}: {source}")]
    InputParse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn load_schema(schema_json: &str) -> Result<FormSchema, HostError> {
    serde_json::from_str(schema_json).map_err(HostError::SchemaParse)
}

fn parse_input<T>(what: &'static str, text: &str) -> Result<T, HostError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(text).map_err(|source| HostError::InputParse { what, source })
}

fn parse_options(options_json: &str) -> Result<EvaluationOptions, HostError> {
    parse_input("evaluation options", options_json)
}

fn parse_state(state_json: &str) -> Result<FormState, HostError> {
    parse_input("form state", state_json)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, HostError> {
    serde_json::to_value(value).map_err(HostError::JsonEncode)
}

fn respond(result: Result<Value, HostError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => {
            tracing::debug!(error = %err, "host request rejected");
            json!({ "error": err.to_string() }).to_string()
        }
    }
}

/// Echoes the parsed schema with its display name.
pub fn describe(schema_json: &str) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let mut value = encode(&schema)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("displayName".into(), Value::String(schema.display_name().into()));
        }
        Ok(value)
    }))
}

/// Lists structural problems in the schema.
pub fn check_schema(schema_json: &str) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let issues = schema.check();
        Ok(json!({
            "valid": !has_errors(&issues),
            "issues": encode(&issues)?,
        }))
    }))
}

/// Starts a preview session.
pub fn init_state(schema_json: &str, options_json: &str) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let options = parse_options(options_json)?;
        encode(&initial_state(&schema, &options))
    }))
}

/// Applies a single field edit and returns the next state.
pub fn field_changed(
    schema_json: &str,
    state_json: &str,
    field_id: &str,
    value_json: &str,
    options_json: &str,
) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let state = parse_state(state_json)?;
        let options = parse_options(options_json)?;
        let value: Value = serde_json::from_str(value_json).map_err(|source| {
            HostError::InputParse {
                what: "field value",
                source,
            }
        })?;
        let next = apply_change(&schema, &state, field_id, value, &options)?;
        encode(&next)
    }))
}

/// Validates every field; `accepted` tells whether the form may be submitted.
pub fn submit(schema_json: &str, state_json: &str) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let state = parse_state(state_json)?;
        let submission = submit_form(&schema, &state);
        let status = if submission.accepted { "accepted" } else { "error" };
        let mut value = encode(&submission)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("status".into(), Value::String(status.into()));
        }
        Ok(value)
    }))
}

/// Moves a field and returns the updated schema.
pub fn reorder(schema_json: &str, from: usize, to: usize) -> String {
    respond(load_schema(schema_json).and_then(|mut schema| {
        reorder_fields(&mut schema.fields, from, to)?;
        encode(&schema)
    }))
}

/// Computes one field's value from `data_json` without touching any state.
pub fn resolve_field(
    schema_json: &str,
    data_json: &str,
    field_id: &str,
    options_json: &str,
) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let data: Map<String, Value> = parse_input("form data", data_json)?;
        let options = parse_options(options_json)?;
        let field = schema
            .field(field_id)
            .ok_or_else(|| EngineError::UnknownField(field_id.to_string()))?;
        let value = resolve_on(field, &data, &schema.fields, options.current_date());
        Ok(json!({ "id": field.id, "value": value }))
    }))
}

fn open_saved(store_json: &str) -> SavedForms<MemoryStore> {
    SavedForms::open(MemoryStore::with_text(store_json))
}

/// Lists the saved forms held in `store_json`; a corrupt store reads as empty.
pub fn list_forms(store_json: &str) -> String {
    let saved = open_saved(store_json);
    respond(
        saved
            .forms()
            .iter()
            .map(|form| {
                Ok(json!({
                    "id": form.id,
                    "name": form.display_name(),
                    "fields": form.fields.len(),
                    "createdAt": encode(&form.created_at)?,
                }))
            })
            .collect::<Result<Vec<_>, HostError>>()
            .map(Value::Array),
    )
}

/// Adds or replaces a form in the collection and returns the new collection.
pub fn save_form(store_json: &str, schema_json: &str) -> String {
    respond(load_schema(schema_json).and_then(|schema| {
        let mut saved = open_saved(store_json);
        saved.save_form(schema);
        encode(&saved.forms())
    }))
}

/// Drops a form by id; `deleted` is false when nothing matched.
pub fn delete_form(store_json: &str, form_id: &str) -> String {
    let mut saved = open_saved(store_json);
    let deleted = saved.delete_form(form_id);
    respond(encode(&saved.forms()).map(|forms| json!({ "deleted": deleted, "forms": forms })))
}
