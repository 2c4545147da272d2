mod author;
mod preview;
mod prompt;

use clap::{Parser, Subcommand};
use form_host::{check_schema, field_changed, init_state, submit};
use form_spec::{
    EvaluationOptions, FormData, FormSchema, FormState, FormStore, JsonFileStore, SavedForms,
    Severity, Submission, reorder_fields, validate_form,
};
use serde_json::Value;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use preview::{PreviewPresenter, Verbosity, display_value};
use prompt::parse_answer;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const STORE_ENV: &str = "FORM_BUILDER_STORE";
const DEFAULT_STORE: &str = "forms.json";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form builder CLI",
    long_about = "Author form definitions, preview them with live validation and derived fields, and manage the saved form collection"
)]
struct Cli {
    /// Saved-forms file (defaults to FORM_BUILDER_STORE or ./forms.json).
    #[arg(long, value_name = "FILE", global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a new form interactively and write it to a file.
    New {
        /// Where to write the form JSON.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Also add the form to the saved collection.
        #[arg(long)]
        save: bool,
        /// Overwrite the output file if present.
        #[arg(long)]
        force: bool,
    },
    /// Fill a form in the terminal with live validation.
    Fill {
        /// Path to the form JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Optional JSON object with initial field values.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        /// Recompute derived-of-derived fields too.
        #[arg(long)]
        transitive: bool,
        /// Show every derived value after each edit.
        #[arg(long)]
        verbose: bool,
    },
    /// Validate a data file against a form.
    Validate {
        /// Path to the form JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Path to the JSON object with field values.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Report structural problems in a form.
    Check {
        /// Path to the form JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    /// Move a field to another position.
    Reorder {
        /// Path to the form JSON; rewritten in place unless --out is given.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Manage the saved form collection.
    Forms {
        #[command(subcommand)]
        command: FormsCommand,
    },
    /// Print the JSON schema of the saved-forms format.
    JsonSchema,
}

#[derive(Subcommand)]
enum FormsCommand {
    /// List saved forms.
    List,
    /// Print one saved form.
    Show { id: String },
    /// Add a form file to the collection, replacing any entry with its id.
    Save { file: PathBuf },
    /// Remove a saved form.
    Delete { id: String },
}

fn main() -> CliResult<()> {
    init_logging();
    let cli = Cli::parse();
    let store = cli.store;
    match cli.command {
        Command::New { out, save, force } => run_new(out, save, force, store),
        Command::Fill {
            schema,
            data,
            transitive,
            verbose,
        } => run_fill(schema, data, transitive, verbose),
        Command::Validate { schema, data } => run_validate(schema, data),
        Command::Check { schema } => run_check(schema),
        Command::Reorder {
            schema,
            from,
            to,
            out,
        } => run_reorder(schema, from, to, out),
        Command::Forms { command } => run_forms(command, store),
        Command::JsonSchema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&FormSchema::json_schema())?
            );
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_store_path(store: Option<PathBuf>) -> CliResult<PathBuf> {
    let candidate = match store {
        Some(path) => path,
        None => env::var_os(STORE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE)),
    };
    if candidate.as_os_str().is_empty() {
        return Err("store path cannot be empty".into());
    }
    Ok(candidate)
}

fn open_saved(store: Option<PathBuf>) -> CliResult<SavedForms<JsonFileStore>> {
    let path = resolve_store_path(store)?;
    tracing::debug!(path = %path.display(), "opening saved forms");
    Ok(SavedForms::open(JsonFileStore::new(path)))
}

fn read_schema(path: &Path) -> CliResult<(String, FormSchema)> {
    let text = fs::read_to_string(path)?;
    let schema = serde_json::from_str(&text)?;
    Ok((text, schema))
}

fn read_data(path: &Path) -> CliResult<FormData> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("form data must be a JSON object".into()),
    }
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> CliResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn run_new(out: PathBuf, save: bool, force: bool, store: Option<PathBuf>) -> CliResult<()> {
    if out.exists() && !force {
        return Err(format!("{} already exists; pass --force to overwrite", out.display()).into());
    }
    let schema = author::author_form()?;
    write_json(&out, &schema)?;
    println!("Wrote form '{}' to {}", schema.name, out.display());
    if save {
        let mut saved = open_saved(store)?;
        saved.save_form(schema.clone());
        ensure_persisted(&saved)?;
        println!("Saved form {} ({})", schema.id, schema.name);
    }
    Ok(())
}

fn run_fill(
    schema_path: PathBuf,
    data_path: Option<PathBuf>,
    transitive: bool,
    verbose: bool,
) -> CliResult<()> {
    let (schema_json, schema) = read_schema(&schema_path)?;
    let options = if transitive {
        serde_json::to_string(&EvaluationOptions::transitive())?
    } else {
        String::new()
    };

    let mut state: FormState = parse_host_result(&init_state(&schema_json, &options))?;
    if let Some(path) = data_path {
        for (field_id, value) in read_data(&path)? {
            state = parse_host_result(&field_changed(
                &schema_json,
                &serde_json::to_string(&state)?,
                &field_id,
                &value.to_string(),
                &options,
            ))?;
        }
    }

    let mut presenter = PreviewPresenter::new(Verbosity::from_verbose(verbose));
    presenter.show_header(&schema);

    let editable: Vec<_> = schema.fields.iter().filter(|field| !field.is_derived).collect();
    let total = editable.len();
    for (position, field) in editable.iter().enumerate() {
        loop {
            presenter.show_prompt(position + 1, total, field);
            let current = state.data.get(&field.id).map(display_value).unwrap_or_default();
            let raw = prompt::prompt_line(">", Some(&current))?;
            if raw.eq_ignore_ascii_case("exit") {
                return Err("preview aborted by user".into());
            }
            let value = match parse_answer(field, &raw) {
                Ok(value) => value,
                Err(err) => {
                    presenter.show_parse_error(&err);
                    continue;
                }
            };

            let next: FormState = parse_host_result(&field_changed(
                &schema_json,
                &serde_json::to_string(&state)?,
                &field.id,
                &value.to_string(),
                &options,
            ))?;
            presenter.show_derived(&schema, &state.data, &next.data);
            let messages = next.errors.get(&field.id).cloned().unwrap_or_default();
            state = next;
            if messages.is_empty() {
                break;
            }
            presenter.show_field_errors(&messages);
        }
    }

    let submission: Submission =
        parse_host_result(&submit(&schema_json, &serde_json::to_string(&state)?))?;
    presenter.show_submission(&schema, &submission);
    if submission.accepted {
        Ok(())
    } else {
        Err("submission rejected".into())
    }
}

fn parse_host_result<T: serde::de::DeserializeOwned>(response: &str) -> CliResult<T> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(error.into());
    }
    Ok(serde_json::from_value(value)?)
}

fn run_validate(schema_path: PathBuf, data_path: PathBuf) -> CliResult<()> {
    let (_, schema) = read_schema(&schema_path)?;
    let data = read_data(&data_path)?;
    let errors = validate_form(&schema, &data);

    println!(
        "Validation result: {}",
        if errors.is_empty() { "valid" } else { "invalid" }
    );
    for (field_id, messages) in &errors {
        for message in messages {
            println!("  {} - {}", field_id, message);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_check(schema_path: PathBuf) -> CliResult<()> {
    let schema_json = fs::read_to_string(schema_path)?;
    let report: Value = parse_host_result(&check_schema(&schema_json))?;
    let issues: Vec<form_spec::SchemaIssue> = serde_json::from_value(report["issues"].clone())?;

    if issues.is_empty() {
        println!("No issues found.");
    }
    for issue in &issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!(
            "{}: {} [{}] {}",
            level,
            issue.field_id.as_deref().unwrap_or("<form>"),
            issue.code,
            issue.message
        );
    }

    if report["valid"].as_bool().unwrap_or(false) {
        Ok(())
    } else {
        Err("form has structural errors".into())
    }
}

fn run_reorder(
    schema_path: PathBuf,
    from: usize,
    to: usize,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let (_, mut schema) = read_schema(&schema_path)?;
    reorder_fields(&mut schema.fields, from, to)?;
    let target = out.unwrap_or(schema_path);
    write_json(&target, &schema)?;
    let order: Vec<&str> = schema.fields.iter().map(|field| field.id.as_str()).collect();
    println!("Field order: {}", order.join(", "));
    Ok(())
}

fn run_forms(command: FormsCommand, store: Option<PathBuf>) -> CliResult<()> {
    let mut saved = open_saved(store)?;
    match command {
        FormsCommand::List => {
            if saved.forms().is_empty() {
                println!("No saved forms.");
            }
            for form in saved.forms() {
                println!(
                    "{}\t{}\t{} fields\t{}",
                    form.id,
                    form.display_name(),
                    form.fields.len(),
                    form.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        FormsCommand::Show { id } => {
            let form = saved
                .get(&id)
                .ok_or_else(|| format!("no saved form with id '{}'", id))?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", serde_json::to_string_pretty(form)?)?;
            Ok(())
        }
        FormsCommand::Save { file } => {
            let (_, form) = read_schema(&file)?;
            if form.name.trim().is_empty() {
                return Err("form name must not be empty".into());
            }
            let summary = format!("Saved form {} ({})", form.id, form.display_name());
            saved.save_form(form);
            ensure_persisted(&saved)?;
            println!("{}", summary);
            Ok(())
        }
        FormsCommand::Delete { id } => {
            if !saved.delete_form(&id) {
                return Err(format!("no saved form with id '{}'", id).into());
            }
            ensure_persisted(&saved)?;
            println!("Deleted form {}", id);
            Ok(())
        }
    }
}

/// Persistence is best effort inside the library; the CLI still reports a
/// store that did not take the write.
fn ensure_persisted(saved: &SavedForms<JsonFileStore>) -> CliResult<()> {
    let stored = saved.store().try_load()?;
    if stored.as_slice() == saved.forms() {
        Ok(())
    } else {
        Err(format!("could not write {}", saved.store().path().display()).into())
    }
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use serde_json::{Value, json};
    use std::fs;

    fn signup() -> Value {
        json!({
            "id": "signup",
            "name": "Signup",
            "createdAt": "2024-05-01T09:30:00Z",
            "fields": [
                {
                    "id": "email",
                    "type": "text",
                    "label": "Email",
                    "required": true,
                    "validationRules": [
                        { "type": "required" },
                        { "type": "email" }
                    ],
                    "order": 0
                },
                { "id": "dob", "type": "date", "label": "Date of birth", "order": 1 },
                {
                    "id": "age",
                    "type": "number",
                    "label": "Age",
                    "isDerived": true,
                    "parentFields": ["dob"],
                    "formula": "age from dob",
                    "order": 2
                },
                {
                    "id": "plan",
                    "type": "select",
                    "label": "Plan",
                    "options": ["basic", "pro"],
                    "defaultValue": "basic",
                    "order": 3
                }
            ]
        })
    }

    fn bin() -> Command {
        let mut cmd = Command::cargo_bin("form-builder").expect("binary");
        cmd.env_remove("FORM_BUILDER_STORE");
        cmd
    }

    #[test]
    fn validate_reports_invalid_email() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;
        let data = temp.child("data.json");
        data.write_str(r#"{ "email": "a@b" }"#)?;

        let output = bin()
            .arg("validate")
            .arg("--schema")
            .arg(schema.path())
            .arg("--data")
            .arg(data.path())
            .assert()
            .failure()
            .get_output()
            .clone();
        let stdout = String::from_utf8(output.stdout)?;
        assert!(stdout.contains("invalid"));
        assert!(stdout.contains("email - Please enter a valid email address"));
        Ok(())
    }

    #[test]
    fn validate_accepts_complete_data() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;
        let data = temp.child("data.json");
        data.write_str(r#"{ "email": "a@b.com", "dob": "2000-06-15" }"#)?;

        bin()
            .arg("validate")
            .arg("--schema")
            .arg(schema.path())
            .arg("--data")
            .arg(data.path())
            .assert()
            .success();
        Ok(())
    }

    #[test]
    fn reorder_rewrites_orders() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;

        bin()
            .arg("reorder")
            .arg("--schema")
            .arg(schema.path())
            .arg("--from")
            .arg("0")
            .arg("--to")
            .arg("2")
            .assert()
            .success();

        let updated: Value = serde_json::from_str(&fs::read_to_string(schema.path())?)?;
        let fields = updated["fields"].as_array().expect("fields");
        let ids: Vec<&str> = fields.iter().filter_map(|f| f["id"].as_str()).collect();
        assert_eq!(ids, ["dob", "age", "email", "plan"]);
        for (index, field) in fields.iter().enumerate() {
            assert_eq!(field["order"], index);
        }
        Ok(())
    }

    #[test]
    fn reorder_rejects_out_of_range() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        let original = signup().to_string();
        schema.write_str(&original)?;

        bin()
            .arg("reorder")
            .arg("--schema")
            .arg(schema.path())
            .arg("--from")
            .arg("9")
            .arg("--to")
            .arg("0")
            .assert()
            .failure();
        assert_eq!(fs::read_to_string(schema.path())?, original);
        Ok(())
    }

    #[test]
    fn check_flags_self_parent() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let mut form = signup();
        form["fields"][2]["parentFields"] = json!(["age"]);
        let schema = temp.child("broken.json");
        schema.write_str(&form.to_string())?;

        let output = bin()
            .arg("check")
            .arg("--schema")
            .arg(schema.path())
            .assert()
            .failure()
            .get_output()
            .clone();
        let stdout = String::from_utf8(output.stdout)?;
        assert!(stdout.contains("self_parent"));
        Ok(())
    }

    #[test]
    fn forms_save_list_show_delete() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let store = temp.child("store").child("forms.json");
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;

        bin()
            .arg("--store")
            .arg(store.path())
            .args(["forms", "save"])
            .arg(schema.path())
            .assert()
            .success();

        let listed = bin()
            .arg("--store")
            .arg(store.path())
            .args(["forms", "list"])
            .assert()
            .success()
            .get_output()
            .clone();
        assert!(String::from_utf8(listed.stdout)?.contains("signup\tSignup\t4 fields"));

        let shown = bin()
            .arg("--store")
            .arg(store.path())
            .args(["forms", "show", "signup"])
            .assert()
            .success()
            .get_output()
            .clone();
        let form: Value = serde_json::from_slice(&shown.stdout)?;
        assert_eq!(form["fields"][2]["formula"], "age from dob");

        bin()
            .env("FORM_BUILDER_STORE", store.path())
            .args(["forms", "delete", "signup"])
            .assert()
            .success();
        let stored: Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        assert_eq!(stored, json!([]));
        Ok(())
    }

    #[test]
    fn fill_stops_when_input_runs_out() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;

        let output = bin()
            .arg("fill")
            .arg("--schema")
            .arg(schema.path())
            .arg("--transitive")
            .write_stdin("")
            .timeout(std::time::Duration::from_secs(10))
            .assert()
            .failure()
            .get_output()
            .clone();
        let stderr = String::from_utf8(output.stderr)?;
        assert!(stderr.contains("unexpected end of input"));
        assert!(stderr.matches("This field is required").count() <= 1);
        Ok(())
    }

    #[test]
    fn fill_prompts_and_computes_age() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let schema = temp.child("signup.json");
        schema.write_str(&signup().to_string())?;

        let stdin = ["not-an-email", "ada@example.com", "1990-01-01", "2"].join("\n") + "\n";
        let output = bin()
            .arg("fill")
            .arg("--schema")
            .arg(schema.path())
            .write_stdin(stdin)
            .assert()
            .success()
            .get_output()
            .clone();
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = String::from_utf8(output.stderr)?;
        assert!(stdout.contains("Form: Signup"));
        assert!(stderr.contains("Please enter a valid email address"));
        assert!(stdout.contains("= Age:"));
        assert!(stdout.contains("Submitted"));
        assert!(stdout.contains("\"plan\": \"pro\""));
        Ok(())
    }

    #[test]
    fn new_writes_form_and_saves() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let out = temp.child("profile.json");
        let store = temp.child("forms.json");
        let answers = [
            "Profile",
            "Date of birth",
            "date",
            "n",
            "",
            "",
            "Age",
            "number",
            "n",
            "",
            "min=0",
            "y",
            "date_of_birth",
            "age from dob",
            "",
        ];
        let stdin = format!("{}\n", answers.join("\n"));

        bin()
            .arg("--store")
            .arg(store.path())
            .arg("new")
            .arg("--out")
            .arg(out.path())
            .arg("--save")
            .write_stdin(stdin)
            .assert()
            .success();

        let form: Value = serde_json::from_str(&fs::read_to_string(out.path())?)?;
        assert_eq!(form["name"], "Profile");
        assert_eq!(form["fields"][1]["id"], "age");
        assert_eq!(form["fields"][1]["isDerived"], true);
        assert_eq!(form["fields"][1]["parentFields"][0], "date_of_birth");
        assert_eq!(form["fields"][1]["validationRules"][0]["type"], "min");
        assert_eq!(form["fields"][1]["order"], 1);

        let stored: Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        assert_eq!(stored[0]["id"], form["id"]);
        Ok(())
    }
}
