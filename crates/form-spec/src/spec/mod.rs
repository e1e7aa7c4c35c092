pub mod definition;
pub mod field;
pub mod form;
pub mod submission;

pub use definition::{
    DefinitionError, FormDefinition, check_conditions, check_field_shape, normalize_options,
    normalize_slug, sort_fields,
};
pub use field::{Field, FieldCondition, FieldId, FieldUpdate, NewField};
pub use form::{Form, FormId, FormStatus, FormUpdate, MediaType, NewForm};
pub use submission::{NewSubmissionValue, Submission, SubmissionId, SubmissionValue};
