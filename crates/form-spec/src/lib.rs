#![allow(missing_docs)]

pub mod answers;
pub mod export;
pub mod field_type;
pub mod location;
pub mod media;
pub mod render;
pub mod schema;
pub mod spec;
pub mod templates;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerError, AnswerMap, AnswerValue, CHOICE_SEPARATOR, join_choices, split_choices};
pub use export::{
    ExportError, FormScope, LocationPin, Sheet, SortDirection, SortKey, SubmissionQuery,
    SubmissionRecord, apply_query, build_sheet, collect_locations, export_file_name, write_csv,
};
pub use field_type::{FieldType, FormatRule, Widget};
pub use location::{
    CaptureSource, GeoPoint, GeoPointError, GeolocationFailure, LocationCapture, LookupTicket,
    Notice,
};
pub use media::{MediaEmbed, video_embed};
pub use render::{
    RenderCondition, RenderError, RenderField, RenderPayload, RenderStatus, build_render_payload,
    render_html, render_json_ui, render_login, render_not_found, render_text,
};
pub use schema::definition_schema;
pub use spec::{
    DefinitionError, Field, FieldCondition, FieldId, FieldUpdate, Form, FormDefinition, FormId,
    FormStatus, FormUpdate, MediaType, NewField, NewForm, NewSubmissionValue, Submission,
    SubmissionId, SubmissionValue,
};
pub use templates::{FormTemplate, builtin_templates, find_template};
pub use validate::{ErrorKind, ValidationError, ValidationResult, validate, validate_answers};
pub use visibility::{FormSession, VisibilityMap, VisibilityMode, resolve_visibility, visible_ids};
