use std::fs;

use form_spec::{
    FieldType, FormBuilder, FormField, FormSchema, FormStore, JsonFileStore, MemoryStore,
    SavedForms,
};
use tempfile::TempDir;

fn sample(name: &str) -> FormSchema {
    let mut builder = FormBuilder::new();
    builder.set_name(name);
    builder
        .add_field(FormField::with_id("dob", FieldType::Date))
        .expect("add");
    let mut age = FormField::with_id("age", FieldType::Number);
    age.is_derived = true;
    age.parent_fields = vec!["dob".into()];
    age.formula = Some("age from dob".into());
    builder.add_field(age).expect("add");
    builder.snapshot_for_save().expect("snapshot")
}

#[test]
fn saved_form_round_trips_through_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("forms.json");
    let form = sample("Profile");

    let mut saved = SavedForms::open(JsonFileStore::new(&path));
    assert!(saved.forms().is_empty());
    saved.save_form(form.clone());

    let reloaded = SavedForms::open(JsonFileStore::new(&path));
    let entry = reloaded.get(&form.id).expect("saved entry");
    assert_eq!(entry.id, form.id);
    assert_eq!(entry.name, form.name);
    assert_eq!(entry.fields, form.fields);
    assert_eq!(entry.created_at, form.created_at);

    let text = fs::read_to_string(&path).expect("read");
    assert!(text.contains("\"parentFields\""));
    assert!(text.contains("\"createdAt\""));
}

#[test]
fn saving_same_id_replaces_entry() {
    let mut saved = SavedForms::open(MemoryStore::new());
    let mut form = sample("First");
    saved.save_form(form.clone());
    saved.save_form(sample("Other"));

    form.name = "Renamed".into();
    saved.save_form(form.clone());

    assert_eq!(saved.forms().len(), 2);
    assert_eq!(saved.forms()[0].name, "Renamed");
    let stored = saved.store().try_load().expect("load");
    assert_eq!(stored[0].name, "Renamed");
    let text = saved.store().text().expect("written");
    assert!(text.contains("\"Renamed\""));
    assert!(!text.contains("\"First\""));
}

#[test]
fn delete_removes_entry_and_persists() {
    let mut saved = SavedForms::open(MemoryStore::new());
    let form = sample("Doomed");
    saved.save_form(form.clone());
    assert!(saved.delete_form(&form.id));
    assert!(!saved.delete_form(&form.id));
    assert!(saved.store().load().is_empty());
}

#[test]
fn corrupt_store_loads_as_empty() {
    let store = MemoryStore::with_text("{ not json");
    assert!(store.try_load().is_err());
    assert!(store.load().is_empty());

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("forms.json");
    fs::write(&path, "[{\"id\": 3}]").expect("write");
    let saved = SavedForms::open(JsonFileStore::new(&path));
    assert!(saved.forms().is_empty());
}

#[test]
fn missing_or_blank_store_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("absent.json"));
    assert!(store.try_load().expect("load").is_empty());

    let blank = dir.path().join("blank.json");
    fs::write(&blank, "  \n").expect("write");
    assert!(JsonFileStore::new(&blank).try_load().expect("load").is_empty());
}

#[test]
fn failed_save_keeps_session_usable() {
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "file").expect("write");
    let store = JsonFileStore::new(blocker.join("forms.json"));

    let mut saved = SavedForms::open(store);
    let form = sample("Unsaved");
    saved.save_form(form.clone());
    assert_eq!(saved.get(&form.id).map(|entry| entry.name.as_str()), Some("Unsaved"));
}

#[test]
fn unknown_rule_kinds_survive_storage() {
    let text = include_str!("../tests/fixtures/signup_form.json");
    let form: FormSchema = serde_json::from_str(text).expect("deserialize");
    let mut store = MemoryStore::new();
    store.save(std::slice::from_ref(&form));
    let loaded = store.load();
    assert_eq!(loaded[0].fields[4].validation_rules[0].kind.as_str(), "phone");
    assert_eq!(loaded[0], form);
}
