//! Public side: loading an active form by slug and accepting submissions.

use std::sync::Arc;

use chrono::Utc;
use form_spec::{
    AnswerMap, Field, FieldId, FormDefinition, FormSession, Submission, SubmissionValue,
    VisibilityMode, validate, visible_ids,
};
use form_store::FormStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult, backend};

/// What was stored for one accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub values: Vec<SubmissionValue>,
}

/// One answer change applied to an in-progress answer set.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerChange {
    #[serde(default)]
    pub answers: AnswerMap,
    pub field_id: FieldId,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerPreview {
    pub answers: AnswerMap,
    pub cleared: Vec<FieldId>,
    pub visible: Vec<FieldId>,
}

#[derive(Clone)]
pub struct FormIntake {
    store: Arc<dyn FormStore>,
}

impl FormIntake {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    /// Active form with its enabled fields in display order. Draft, disabled
    /// and unknown slugs are all reported as not found.
    #[instrument(name = "intake.load_public_form", skip_all, fields(slug = %slug))]
    pub async fn load_public_form(&self, slug: &str) -> ServiceResult<FormDefinition> {
        let form = self
            .store
            .form_by_slug(slug)
            .await
            .map_err(backend("form_by_slug"))?
            .filter(|form| form.status.is_public());
        let Some(form) = form else {
            debug!("no active form for slug");
            return Err(ServiceError::not_found("form", slug));
        };
        let fields = self
            .store
            .list_fields(form.id, true)
            .await
            .map_err(backend("list_fields"))?;
        Ok(FormDefinition { form, fields })
    }

    /// Validates and stores one submission. Answers of hidden fields are
    /// dropped before validation; nothing is written when validation fails.
    #[instrument(name = "intake.submit", skip_all, fields(slug = %slug))]
    pub async fn submit(&self, slug: &str, answers: AnswerMap) -> ServiceResult<SubmissionReceipt> {
        let definition = self.load_public_form(slug).await?;
        let session = session_for(definition.fields, answers);
        let visible = visible_ids(session.visibility());
        let result = validate(session.fields(), &visible, session.answers());
        if !result.valid {
            debug!(errors = result.errors.len(), "submission rejected");
            return Err(ServiceError::Validation(result));
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            form_id: definition.form.id,
            created_at: Utc::now(),
        };
        let submission = self
            .store
            .insert_submission(submission)
            .await
            .map_err(backend("insert_submission"))?;

        let values = session
            .submission_values()
            .into_iter()
            .map(|(field_id, value)| SubmissionValue {
                id: Uuid::new_v4(),
                submission_id: submission.id,
                field_id,
                value,
            })
            .collect::<Vec<_>>();
        let values = if values.is_empty() {
            values
        } else {
            match self.store.insert_values(values).await {
                Ok(values) => values,
                Err(err) => return Err(self.undo_submission(&submission, err).await),
            }
        };

        info!(
            form_id = %submission.form_id,
            submission_id = %submission.id,
            answers = values.len(),
            "submission stored"
        );
        Ok(SubmissionReceipt { submission, values })
    }

    /// Applies one answer change and reports which answers were cleared
    /// because their fields became hidden.
    pub async fn preview(&self, slug: &str, change: AnswerChange) -> ServiceResult<AnswerPreview> {
        let definition = self.load_public_form(slug).await?;
        let mut session = session_for(definition.fields, change.answers);
        let cleared = session.set_answer(change.field_id, change.value);
        let visible = session.visible_fields().map(|field| field.id).collect();
        Ok(AnswerPreview {
            answers: session.into_answers(),
            cleared,
            visible,
        })
    }

    async fn undo_submission(
        &self,
        submission: &Submission,
        err: form_store::StoreError,
    ) -> ServiceError {
        warn!(submission_id = %submission.id, error = %err, "answers failed, removing submission");
        match self.store.delete_submission(submission.id).await {
            Ok(()) => backend("insert_values")(err),
            Err(cleanup) => {
                warn!(submission_id = %submission.id, error = %cleanup, "could not remove submission");
                ServiceError::PartialWrite {
                    completed: "the submission was recorded".to_string(),
                    failed: "its answers could not be saved".to_string(),
                }
            }
        }
    }
}

fn session_for(fields: Vec<Field>, answers: AnswerMap) -> FormSession {
    FormSession::with_answers(fields, answers, VisibilityMode::Hidden)
}
