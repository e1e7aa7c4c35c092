//! Data access layer: typed reads and writes over forms, fields, submissions
//! and submission values.
//!
//! Two backends implement [`FormStore`]: [`MemoryStore`] keeps everything in
//! process, [`SqliteStore`] persists through sqlx. Both cascade form deletes to
//! fields, submissions and values, and submission deletes to values.

mod error;
mod memory;
mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use form_spec::{
    Field, FieldId, FieldUpdate, Form, FormId, FormStatus, FormUpdate, Submission, SubmissionId,
    SubmissionValue,
};
use tracing::info;

pub use error::{StoreError, StoreResult};
#[cfg(feature = "testing")]
pub use memory::FailurePoint;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// `db.url` value selecting the in-memory backend.
pub const MEMORY_URL: &str = "memory";

#[async_trait]
pub trait FormStore: Send + Sync {
    async fn insert_form(&self, form: Form) -> StoreResult<Form>;
    async fn update_form(
        &self,
        id: FormId,
        update: FormUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Form>;
    /// Removes the form with its fields, submissions and values.
    async fn delete_form(&self, id: FormId) -> StoreResult<()>;
    /// Fetch-one: fails with `NotFound` when the form does not exist.
    async fn form(&self, id: FormId) -> StoreResult<Form>;
    async fn find_form(&self, id: FormId) -> StoreResult<Option<Form>>;
    async fn form_by_slug(&self, slug: &str) -> StoreResult<Option<Form>>;
    /// Newest first.
    async fn list_forms(&self) -> StoreResult<Vec<Form>>;
    async fn count_forms(&self, status: Option<FormStatus>) -> StoreResult<u64>;

    /// Batch insert; either every field is stored or none.
    async fn insert_fields(&self, fields: Vec<Field>) -> StoreResult<Vec<Field>>;
    async fn update_field(
        &self,
        id: FieldId,
        update: FieldUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Field>;
    async fn set_field_order(
        &self,
        id: FieldId,
        order: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<Field>;
    /// Removes the field and drops conditions that pointed at it. Stored
    /// answers referencing the field are kept.
    async fn delete_field(&self, id: FieldId) -> StoreResult<()>;
    async fn field(&self, id: FieldId) -> StoreResult<Field>;
    /// Fields of one form ordered by `order`, then insertion.
    async fn list_fields(&self, form_id: FormId, enabled_only: bool) -> StoreResult<Vec<Field>>;
    /// Fields of every form, grouped by form and ordered like [`FormStore::list_fields`].
    async fn list_all_fields(&self) -> StoreResult<Vec<Field>>;
    async fn max_field_order(&self, form_id: FormId) -> StoreResult<Option<i64>>;

    async fn insert_submission(&self, submission: Submission) -> StoreResult<Submission>;
    /// Batch insert; either every value is stored or none.
    async fn insert_values(&self, values: Vec<SubmissionValue>)
    -> StoreResult<Vec<SubmissionValue>>;
    /// Oldest first, ties in insertion order. `None` lists every form.
    async fn list_submissions(&self, form_id: Option<FormId>) -> StoreResult<Vec<Submission>>;
    async fn list_values(&self, submission_ids: &[SubmissionId])
    -> StoreResult<Vec<SubmissionValue>>;
    /// Removes the submission together with all of its values.
    async fn delete_submission(&self, id: SubmissionId) -> StoreResult<()>;
    async fn count_submissions(&self, form_id: Option<FormId>) -> StoreResult<u64>;
    async fn submission_counts(&self) -> StoreResult<BTreeMap<FormId, u64>>;
}

/// Opens the backend named by `url`: [`MEMORY_URL`] or an sqlx SQLite URL.
pub async fn open_store(url: &str) -> StoreResult<Arc<dyn FormStore>> {
    if url.trim() == MEMORY_URL {
        info!("using in-memory form store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(url).await?;
    info!("connected to SQLite form store");
    Ok(Arc::new(store))
}
