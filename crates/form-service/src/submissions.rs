//! Admin side of collected data: listing, searching, exporting and deleting
//! submissions, plus dashboard counts and the location map feed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use form_spec::export::to_csv_bytes;
use form_spec::{
    Field, Form, FormScope, FormStatus, LocationPin, SubmissionId, SubmissionQuery,
    SubmissionRecord, SubmissionValue, apply_query, build_sheet, collect_locations,
    export_file_name,
};
use form_store::FormStore;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{Confirmation, ServiceResult, backend};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub total_forms: u64,
    pub active_forms: u64,
    pub total_submissions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSummary {
    #[serde(flatten)]
    pub form: Form,
    pub submissions: u64,
}

#[derive(Clone)]
pub struct SubmissionBrowser {
    store: Arc<dyn FormStore>,
}

impl SubmissionBrowser {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    /// Submissions in the scope joined with their answers and form names,
    /// oldest first.
    pub async fn load_records(&self, scope: FormScope) -> ServiceResult<Vec<SubmissionRecord>> {
        let form_names = self
            .store
            .list_forms()
            .await
            .map_err(backend("list_forms"))?
            .into_iter()
            .map(|form| (form.id, form.name))
            .collect::<BTreeMap<_, _>>();

        let form_filter = match scope {
            FormScope::All => None,
            FormScope::One(id) => Some(id),
        };
        let submissions = self
            .store
            .list_submissions(form_filter)
            .await
            .map_err(backend("list_submissions"))?;
        let ids = submissions.iter().map(|s| s.id).collect::<Vec<_>>();
        let mut values_by_submission: BTreeMap<SubmissionId, Vec<SubmissionValue>> =
            BTreeMap::new();
        for value in self
            .store
            .list_values(&ids)
            .await
            .map_err(backend("list_values"))?
        {
            values_by_submission
                .entry(value.submission_id)
                .or_default()
                .push(value);
        }

        Ok(submissions
            .into_iter()
            .map(|submission| SubmissionRecord {
                form_name: form_names
                    .get(&submission.form_id)
                    .cloned()
                    .unwrap_or_default(),
                values: values_by_submission
                    .remove(&submission.id)
                    .unwrap_or_default(),
                submission,
            })
            .collect())
    }

    pub async fn query(&self, query: &SubmissionQuery) -> ServiceResult<Vec<SubmissionRecord>> {
        let records = self.load_records(query.scope).await?;
        Ok(apply_query(records, query))
    }

    /// Field definitions used to label export columns and map pins.
    async fn scope_fields(&self, scope: FormScope) -> ServiceResult<Vec<Field>> {
        match scope {
            FormScope::All => self.store.list_all_fields().await,
            FormScope::One(id) => self.store.list_fields(id, false).await,
        }
        .map_err(backend("list_fields"))
    }

    /// One CSV row per matching submission.
    #[instrument(name = "submissions.export", skip_all, fields(scope = %query.scope.label()))]
    pub async fn export(&self, query: &SubmissionQuery) -> ServiceResult<ExportFile> {
        let records = self.query(query).await?;
        let fields = self.scope_fields(query.scope).await?;
        let sheet = build_sheet(&records, &fields);
        let bytes = to_csv_bytes(&sheet)?;
        info!(rows = sheet.rows.len(), "submissions exported");
        Ok(ExportFile {
            file_name: export_file_name(&query.scope, Utc::now()),
            content_type: CSV_CONTENT_TYPE,
            rows: sheet.rows.len(),
            bytes,
        })
    }

    /// Writes the export into `directory` and returns the file path.
    pub async fn export_to_dir(
        &self,
        query: &SubmissionQuery,
        directory: &Path,
    ) -> ServiceResult<PathBuf> {
        let file = self.export(query).await?;
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(form_spec::ExportError::from)?;
        let path = directory.join(&file.file_name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(form_spec::ExportError::from)?;
        Ok(path)
    }

    /// Deletes a submission together with all of its answers.
    #[instrument(name = "submissions.delete", skip_all, fields(submission_id = %id))]
    pub async fn delete_submission(
        &self,
        id: SubmissionId,
        confirmation: Confirmation,
    ) -> ServiceResult<()> {
        confirmation.require("deleting a submission")?;
        self.store
            .delete_submission(id)
            .await
            .map_err(backend("delete_submission"))?;
        info!("submission deleted");
        Ok(())
    }

    pub async fn locations(&self, scope: FormScope) -> ServiceResult<Vec<LocationPin>> {
        let records = self.load_records(scope).await?;
        let fields = self.scope_fields(scope).await?;
        Ok(collect_locations(&records, &fields))
    }

    /// Headline counts. An unavailable backend yields zeros.
    pub async fn dashboard(&self) -> Dashboard {
        match self.try_dashboard().await {
            Ok(dashboard) => dashboard,
            Err(err) => {
                warn!(error = %err, "dashboard counts unavailable");
                Dashboard::default()
            }
        }
    }

    async fn try_dashboard(&self) -> ServiceResult<Dashboard> {
        Ok(Dashboard {
            total_forms: self
                .store
                .count_forms(None)
                .await
                .map_err(backend("count_forms"))?,
            active_forms: self
                .store
                .count_forms(Some(FormStatus::Active))
                .await
                .map_err(backend("count_forms"))?,
            total_submissions: self
                .store
                .count_submissions(None)
                .await
                .map_err(backend("count_submissions"))?,
        })
    }

    /// Forms, newest first, with their submission counts. An unavailable
    /// backend yields an empty list.
    pub async fn form_summaries(&self) -> Vec<FormSummary> {
        let loaded = async {
            let forms = self
                .store
                .list_forms()
                .await
                .map_err(backend("list_forms"))?;
            let counts = self
                .store
                .submission_counts()
                .await
                .map_err(backend("submission_counts"))?;
            ServiceResult::Ok((forms, counts))
        };
        match loaded.await {
            Ok((forms, counts)) => forms
                .into_iter()
                .map(|form| FormSummary {
                    submissions: counts.get(&form.id).copied().unwrap_or(0),
                    form,
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "form list unavailable");
                Vec::new()
            }
        }
    }
}
