//! Saved-form persistence.
//!
//! The saved collection is always read and written whole. Readers never see an
//! error: a missing or unreadable store is an empty collection. Writers are
//! best effort: failures are logged and the in-memory collection stays
//! authoritative for the rest of the session.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::spec::form::FormSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored forms are not valid: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("failed to encode forms: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Backend holding the saved form collection.
pub trait FormStore {
    /// Reads the whole collection, surfacing the underlying failure.
    fn try_load(&self) -> Result<Vec<FormSchema>, StoreError>;

    /// Replaces the whole collection, surfacing the underlying failure.
    fn try_save(&mut self, forms: &[FormSchema]) -> Result<(), StoreError>;

    /// Reads the collection; any failure yields an empty one.
    fn load(&self) -> Vec<FormSchema> {
        self.try_load().unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load saved forms; starting empty");
            Vec::new()
        })
    }

    /// Replaces the collection; failures are logged, not returned.
    fn save(&mut self, forms: &[FormSchema]) {
        if let Err(err) = self.try_save(forms) {
            tracing::error!(error = %err, count = forms.len(), "failed to save forms");
        }
    }
}

fn decode(text: &str) -> Result<Vec<FormSchema>, StoreError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(StoreError::Corrupt)
}

fn encode(forms: &[FormSchema]) -> Result<String, StoreError> {
    serde_json::to_string_pretty(forms).map_err(StoreError::Encode)
}

/// Saved forms as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl FormStore for JsonFileStore {
    fn try_load(&self) -> Result<Vec<FormSchema>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => decode(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn try_save(&mut self, forms: &[FormSchema]) -> Result<(), StoreError> {
        let text = encode(forms)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| self.io_error(err))?;

        let mut staged =
            tempfile::NamedTempFile::new_in(&dir).map_err(|err| self.io_error(err))?;
        staged
            .write_all(text.as_bytes())
            .map_err(|err| self.io_error(err))?;
        staged
            .persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        tracing::debug!(path = %self.path.display(), count = forms.len(), "saved forms");
        Ok(())
    }
}

/// Saved forms kept as serialized text in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    text: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose current content is `text`, valid or not.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl FormStore for MemoryStore {
    fn try_load(&self) -> Result<Vec<FormSchema>, StoreError> {
        self.text.as_deref().map_or(Ok(Vec::new()), decode)
    }

    fn try_save(&mut self, forms: &[FormSchema]) -> Result<(), StoreError> {
        self.text = Some(encode(forms)?);
        Ok(())
    }
}

/// The saved form collection backed by a [`FormStore`].
#[derive(Debug)]
pub struct SavedForms<S: FormStore> {
    store: S,
    forms: Vec<FormSchema>,
}

impl<S: FormStore> SavedForms<S> {
    /// Loads the collection from `store`.
    pub fn open(store: S) -> Self {
        let forms = store.load();
        Self { store, forms }
    }

    pub fn forms(&self) -> &[FormSchema] {
        &self.forms
    }

    pub fn get(&self, id: &str) -> Option<&FormSchema> {
        self.forms.iter().find(|form| form.id == id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the entry with the same id, or appends, then persists the
    /// whole collection.
    pub fn save_form(&mut self, form: FormSchema) {
        match self.forms.iter_mut().find(|existing| existing.id == form.id) {
            Some(existing) => *existing = form,
            None => self.forms.push(form),
        }
        self.store.save(&self.forms);
    }

    /// Drops the entry with `id` and persists; returns whether one existed.
    pub fn delete_form(&mut self, id: &str) -> bool {
        let before = self.forms.len();
        self.forms.retain(|form| form.id != id);
        let removed = self.forms.len() != before;
        self.store.save(&self.forms);
        removed
    }

    /// Re-reads the collection from the store.
    pub fn reload(&mut self) {
        self.forms = self.store.load();
    }
}
