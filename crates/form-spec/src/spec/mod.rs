pub mod field;
pub mod form;
pub mod rule;

pub use field::{FieldType, FormField};
pub use form::FormSchema;
pub use rule::{DEFAULT_LENGTH_BOUND, RuleKind, ValidationRule};
