use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spec::field::FieldId;
use crate::spec::form::FormId;

pub type SubmissionId = Uuid;

/// Receipt of one form-fill event. Answers live in [`SubmissionValue`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Submission {
    pub id: SubmissionId,
    pub form_id: FormId,
    pub created_at: DateTime<Utc>,
}

/// One stored answer. `value` uses the string wire format of the field type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubmissionValue {
    pub id: Uuid,
    pub submission_id: SubmissionId,
    pub field_id: FieldId,
    pub value: String,
}

/// Answer row about to be written for a fresh submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmissionValue {
    pub submission_id: SubmissionId,
    pub field_id: FieldId,
    pub value: String,
}
