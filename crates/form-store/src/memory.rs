use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use form_spec::{
    Field, FieldId, FieldUpdate, Form, FormId, FormStatus, FormUpdate, Submission, SubmissionId,
    SubmissionValue, spec::sort_fields,
};
#[cfg(feature = "testing")]
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;

use crate::{FormStore, StoreError, StoreResult};

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Every read operation.
    Reads,
    InsertForm,
    UpdateForm,
    DeleteForm,
    InsertFields,
    UpdateField,
    DeleteField,
    InsertSubmission,
    InsertValues,
    DeleteSubmission,
}

#[cfg(feature = "testing")]
#[derive(Debug)]
struct FailureRule {
    point: FailurePoint,
    successes_left: usize,
}

#[derive(Debug, Default)]
struct Tables {
    forms: Vec<Form>,
    fields: Vec<Field>,
    submissions: Vec<Submission>,
    values: Vec<SubmissionValue>,
}

/// Process-local backend. Rows are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(feature = "testing")]
    failures: Mutex<Vec<FailureRule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `point` fail on every call from now on.
    #[cfg(feature = "testing")]
    pub fn fail(&self, point: FailurePoint) {
        self.fail_after(point, 0);
    }

    /// Lets `successes` calls through, then fails every later call to `point`.
    #[cfg(feature = "testing")]
    pub fn fail_after(&self, point: FailurePoint, successes: usize) {
        let mut failures = self.failures.lock();
        failures.retain(|rule| rule.point != point);
        failures.push(FailureRule {
            point,
            successes_left: successes,
        });
    }

    #[cfg(feature = "testing")]
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    fn check(&self, point: FailurePoint) -> StoreResult<()> {
        #[cfg(feature = "testing")]
        {
            let mut failures = self.failures.lock();
            if let Some(rule) = failures.iter_mut().find(|rule| rule.point == point) {
                if rule.successes_left == 0 {
                    return Err(StoreError::Unavailable(format!(
                        "injected failure at {:?}",
                        point
                    )));
                }
                rule.successes_left -= 1;
            }
        }
        #[cfg(not(feature = "testing"))]
        let _ = point;
        Ok(())
    }
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn insert_form(&self, form: Form) -> StoreResult<Form> {
        self.check(FailurePoint::InsertForm)?;
        let mut tables = self.tables.write();
        if tables.forms.iter().any(|existing| existing.id == form.id) {
            return Err(StoreError::Duplicate {
                entity: "form",
                key: "id",
                value: form.id.to_string(),
            });
        }
        if tables
            .forms
            .iter()
            .any(|existing| existing.public_url == form.public_url)
        {
            return Err(StoreError::Duplicate {
                entity: "form",
                key: "public_url",
                value: form.public_url,
            });
        }
        tables.forms.push(form.clone());
        Ok(form)
    }

    async fn update_form(
        &self,
        id: FormId,
        update: FormUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Form> {
        self.check(FailurePoint::UpdateForm)?;
        let mut tables = self.tables.write();
        let form = tables
            .forms
            .iter_mut()
            .find(|form| form.id == id)
            .ok_or_else(|| StoreError::not_found("form", id))?;
        form.name = update.name;
        form.description = update.description;
        form.status = update.status;
        form.media_type = update.media_type;
        form.media_url = update.media_url;
        form.tutorial_video_url = update.tutorial_video_url;
        form.updated_at = at;
        Ok(form.clone())
    }

    async fn delete_form(&self, id: FormId) -> StoreResult<()> {
        self.check(FailurePoint::DeleteForm)?;
        let mut tables = self.tables.write();
        let before = tables.forms.len();
        tables.forms.retain(|form| form.id != id);
        if tables.forms.len() == before {
            return Err(StoreError::not_found("form", id));
        }
        tables.fields.retain(|field| field.form_id != id);
        let removed = tables
            .submissions
            .iter()
            .filter(|submission| submission.form_id == id)
            .map(|submission| submission.id)
            .collect::<Vec<_>>();
        tables.submissions.retain(|submission| submission.form_id != id);
        tables
            .values
            .retain(|value| !removed.contains(&value.submission_id));
        debug!(form_id = %id, submissions = removed.len(), "form deleted with dependents");
        Ok(())
    }

    async fn form(&self, id: FormId) -> StoreResult<Form> {
        self.find_form(id)
            .await?
            .ok_or_else(|| StoreError::not_found("form", id))
    }

    async fn find_form(&self, id: FormId) -> StoreResult<Option<Form>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables.forms.iter().find(|form| form.id == id).cloned())
    }

    async fn form_by_slug(&self, slug: &str) -> StoreResult<Option<Form>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables
            .forms
            .iter()
            .find(|form| form.public_url == slug)
            .cloned())
    }

    async fn list_forms(&self) -> StoreResult<Vec<Form>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        let mut forms = tables.forms.iter().rev().cloned().collect::<Vec<_>>();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(forms)
    }

    async fn count_forms(&self, status: Option<FormStatus>) -> StoreResult<u64> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables
            .forms
            .iter()
            .filter(|form| status.is_none_or(|status| form.status == status))
            .count() as u64)
    }

    async fn insert_fields(&self, fields: Vec<Field>) -> StoreResult<Vec<Field>> {
        self.check(FailurePoint::InsertFields)?;
        let mut tables = self.tables.write();
        for (index, field) in fields.iter().enumerate() {
            if !tables.forms.iter().any(|form| form.id == field.form_id) {
                return Err(StoreError::not_found("form", field.form_id));
            }
            let duplicate = tables.fields.iter().any(|existing| existing.id == field.id)
                || fields[..index].iter().any(|other| other.id == field.id);
            if duplicate {
                return Err(StoreError::Duplicate {
                    entity: "field",
                    key: "id",
                    value: field.id.to_string(),
                });
            }
        }
        tables.fields.extend(fields.iter().cloned());
        Ok(fields)
    }

    async fn update_field(
        &self,
        id: FieldId,
        update: FieldUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Field> {
        self.check(FailurePoint::UpdateField)?;
        let mut tables = self.tables.write();
        let field = tables
            .fields
            .iter_mut()
            .find(|field| field.id == id)
            .ok_or_else(|| StoreError::not_found("field", id))?;
        field.label = update.label;
        field.kind = update.kind;
        field.required = update.required;
        field.placeholder = update.placeholder;
        field.options = update.options;
        field.enabled = update.enabled;
        field.condition = update.condition;
        field.updated_at = at;
        Ok(field.clone())
    }

    async fn set_field_order(
        &self,
        id: FieldId,
        order: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<Field> {
        self.check(FailurePoint::UpdateField)?;
        let mut tables = self.tables.write();
        let field = tables
            .fields
            .iter_mut()
            .find(|field| field.id == id)
            .ok_or_else(|| StoreError::not_found("field", id))?;
        field.order = order;
        field.updated_at = at;
        Ok(field.clone())
    }

    async fn delete_field(&self, id: FieldId) -> StoreResult<()> {
        self.check(FailurePoint::DeleteField)?;
        let mut tables = self.tables.write();
        let before = tables.fields.len();
        tables.fields.retain(|field| field.id != id);
        if tables.fields.len() == before {
            return Err(StoreError::not_found("field", id));
        }
        for field in tables.fields.iter_mut() {
            if field
                .condition
                .as_ref()
                .is_some_and(|condition| condition.depends_on_field_id == id)
            {
                field.condition = None;
            }
        }
        Ok(())
    }

    async fn field(&self, id: FieldId) -> StoreResult<Field> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        tables
            .fields
            .iter()
            .find(|field| field.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("field", id))
    }

    async fn list_fields(&self, form_id: FormId, enabled_only: bool) -> StoreResult<Vec<Field>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        let mut fields = tables
            .fields
            .iter()
            .filter(|field| field.form_id == form_id && (!enabled_only || field.enabled))
            .cloned()
            .collect::<Vec<_>>();
        sort_fields(&mut fields);
        Ok(fields)
    }

    async fn list_all_fields(&self) -> StoreResult<Vec<Field>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        let mut grouped: Vec<Vec<Field>> = Vec::new();
        for form in &tables.forms {
            let mut fields = tables
                .fields
                .iter()
                .filter(|field| field.form_id == form.id)
                .cloned()
                .collect::<Vec<_>>();
            sort_fields(&mut fields);
            grouped.push(fields);
        }
        Ok(grouped.into_iter().flatten().collect())
    }

    async fn max_field_order(&self, form_id: FormId) -> StoreResult<Option<i64>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables
            .fields
            .iter()
            .filter(|field| field.form_id == form_id)
            .map(|field| field.order)
            .max())
    }

    async fn insert_submission(&self, submission: Submission) -> StoreResult<Submission> {
        self.check(FailurePoint::InsertSubmission)?;
        let mut tables = self.tables.write();
        if !tables.forms.iter().any(|form| form.id == submission.form_id) {
            return Err(StoreError::not_found("form", submission.form_id));
        }
        if tables
            .submissions
            .iter()
            .any(|existing| existing.id == submission.id)
        {
            return Err(StoreError::Duplicate {
                entity: "submission",
                key: "id",
                value: submission.id.to_string(),
            });
        }
        tables.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn insert_values(
        &self,
        values: Vec<SubmissionValue>,
    ) -> StoreResult<Vec<SubmissionValue>> {
        self.check(FailurePoint::InsertValues)?;
        let mut tables = self.tables.write();
        for (index, value) in values.iter().enumerate() {
            if !tables
                .submissions
                .iter()
                .any(|submission| submission.id == value.submission_id)
            {
                return Err(StoreError::not_found("submission", value.submission_id));
            }
            let same_answer = |other: &SubmissionValue| {
                other.submission_id == value.submission_id && other.field_id == value.field_id
            };
            if tables.values.iter().any(same_answer) || values[..index].iter().any(same_answer) {
                return Err(StoreError::Duplicate {
                    entity: "submission value",
                    key: "field_id",
                    value: value.field_id.to_string(),
                });
            }
        }
        tables.values.extend(values.iter().cloned());
        Ok(values)
    }

    async fn list_submissions(&self, form_id: Option<FormId>) -> StoreResult<Vec<Submission>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        let mut submissions = tables
            .submissions
            .iter()
            .filter(|submission| form_id.is_none_or(|id| submission.form_id == id))
            .cloned()
            .collect::<Vec<_>>();
        submissions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(submissions)
    }

    async fn list_values(
        &self,
        submission_ids: &[SubmissionId],
    ) -> StoreResult<Vec<SubmissionValue>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables
            .values
            .iter()
            .filter(|value| submission_ids.contains(&value.submission_id))
            .cloned()
            .collect())
    }

    async fn delete_submission(&self, id: SubmissionId) -> StoreResult<()> {
        self.check(FailurePoint::DeleteSubmission)?;
        let mut tables = self.tables.write();
        let before = tables.submissions.len();
        tables.submissions.retain(|submission| submission.id != id);
        if tables.submissions.len() == before {
            return Err(StoreError::not_found("submission", id));
        }
        tables.values.retain(|value| value.submission_id != id);
        Ok(())
    }

    async fn count_submissions(&self, form_id: Option<FormId>) -> StoreResult<u64> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        Ok(tables
            .submissions
            .iter()
            .filter(|submission| form_id.is_none_or(|id| submission.form_id == id))
            .count() as u64)
    }

    async fn submission_counts(&self) -> StoreResult<BTreeMap<FormId, u64>> {
        self.check(FailurePoint::Reads)?;
        let tables = self.tables.read();
        let mut counts = BTreeMap::new();
        for submission in &tables.submissions {
            *counts.entry(submission.form_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
