#![allow(missing_docs)]

pub mod builder;
pub mod check;
pub mod data;
pub mod derive;
pub mod engine;
pub mod spec;
pub mod store;
pub mod validate;

pub use builder::{FieldPatch, FormBuilder, reorder_fields};
pub use check::{SchemaIssue, Severity, has_errors};
pub use data::{FormData, FormValidationErrors};
pub use derive::{Formula, age_on, parse_date, resolve, resolve_on};
pub use engine::{
    EngineError, EvaluationOptions, FormState, Propagation, Submission, affected_fields,
    apply_change, initial_state, reset, submit,
};
pub use spec::{FieldType, FormField, FormSchema, RuleKind, ValidationRule};
pub use store::{FormStore, JsonFileStore, MemoryStore, SavedForms, StoreError};
pub use validate::{evaluate, is_submittable, validate_form};
