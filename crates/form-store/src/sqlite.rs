use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use form_spec::{
    Field, FieldCondition, FieldId, FieldType, FieldUpdate, Form, FormId, FormStatus, FormUpdate,
    MediaType, Submission, SubmissionId, SubmissionValue,
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{FormStore, StoreError, StoreResult};

const SCHEMA: [&str; 7] = [
    "CREATE TABLE IF NOT EXISTS forms (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        public_url TEXT NOT NULL UNIQUE,
        media_type TEXT NOT NULL,
        media_url TEXT,
        tutorial_video_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS fields (
        id TEXT PRIMARY KEY NOT NULL,
        form_id TEXT NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        label TEXT NOT NULL,
        type TEXT NOT NULL,
        required INTEGER NOT NULL,
        placeholder TEXT,
        options TEXT,
        sort_order INTEGER NOT NULL,
        enabled INTEGER NOT NULL,
        depends_on_field_id TEXT REFERENCES fields(id) ON DELETE SET NULL DEFERRABLE INITIALLY DEFERRED,
        show_when_value TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_fields_form_order ON fields(form_id, sort_order)",
    "CREATE TABLE IF NOT EXISTS submissions (
        id TEXT PRIMARY KEY NOT NULL,
        form_id TEXT NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_submissions_form ON submissions(form_id, created_at)",
    "CREATE TABLE IF NOT EXISTS submission_values (
        id TEXT PRIMARY KEY NOT NULL,
        submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
        field_id TEXT NOT NULL,
        value TEXT NOT NULL,
        UNIQUE (submission_id, field_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_values_submission ON submission_values(submission_id)",
];

const FIELD_COLUMNS: &str = "id, form_id, label, type, required, placeholder, options, sort_order, \
     enabled, depends_on_field_id, show_when_value, created_at, updated_at";

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit.
const IN_CHUNK: usize = 500;

/// SQLite backend. Ids and timestamps are stored as text.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects and creates the tables when missing.
    #[instrument(name = "sqlite-connect", skip_all)]
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|err| StoreError::Unavailable(format!("invalid database url: {err}")))?
            .foreign_keys(true)
            .create_if_missing(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            // one connection holds the whole database; never recycle it
            pool = pool
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }
        let pool = pool
            .connect_with(options)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn corrupt(table: &'static str, detail: impl ToString) -> StoreError {
    StoreError::Corrupt {
        table,
        detail: detail.to_string(),
    }
}

fn uuid_col(row: &SqliteRow, table: &'static str, column: &str) -> StoreResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|err| corrupt(table, format!("{column}: {err}")))
}

fn time_col(row: &SqliteRow, table: &'static str, column: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| corrupt(table, format!("{column}: {err}")))
}

fn form_from_row(row: &SqliteRow) -> StoreResult<Form> {
    let status: String = row.try_get("status")?;
    let media_type: String = row.try_get("media_type")?;
    Ok(Form {
        id: uuid_col(row, "forms", "id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: FormStatus::from_str(&status).map_err(|err| corrupt("forms", err))?,
        public_url: row.try_get("public_url")?,
        media_type: MediaType::from_str(&media_type).map_err(|err| corrupt("forms", err))?,
        media_url: row.try_get("media_url")?,
        tutorial_video_url: row.try_get("tutorial_video_url")?,
        created_at: time_col(row, "forms", "created_at")?,
        updated_at: time_col(row, "forms", "updated_at")?,
    })
}

fn field_from_row(row: &SqliteRow) -> StoreResult<Field> {
    let kind: String = row.try_get("type")?;
    let options: Option<String> = row.try_get("options")?;
    let depends_on: Option<String> = row.try_get("depends_on_field_id")?;
    let show_when: Option<String> = row.try_get("show_when_value")?;

    let condition = match (depends_on, show_when) {
        (Some(depends_on), Some(show_when_value)) => Some(FieldCondition {
            depends_on_field_id: Uuid::parse_str(&depends_on)
                .map_err(|err| corrupt("fields", format!("depends_on_field_id: {err}")))?,
            show_when_value,
        }),
        _ => None,
    };

    Ok(Field {
        id: uuid_col(row, "fields", "id")?,
        form_id: uuid_col(row, "fields", "form_id")?,
        label: row.try_get("label")?,
        kind: FieldType::from_str(&kind).map_err(|err| corrupt("fields", err))?,
        required: row.try_get("required")?,
        placeholder: row.try_get("placeholder")?,
        options: options
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .map_err(|err| corrupt("fields", format!("options: {err}")))?,
        order: row.try_get("sort_order")?,
        enabled: row.try_get("enabled")?,
        condition,
        created_at: time_col(row, "fields", "created_at")?,
        updated_at: time_col(row, "fields", "updated_at")?,
    })
}

fn submission_from_row(row: &SqliteRow) -> StoreResult<Submission> {
    Ok(Submission {
        id: uuid_col(row, "submissions", "id")?,
        form_id: uuid_col(row, "submissions", "form_id")?,
        created_at: time_col(row, "submissions", "created_at")?,
    })
}

fn value_from_row(row: &SqliteRow) -> StoreResult<SubmissionValue> {
    Ok(SubmissionValue {
        id: uuid_col(row, "submission_values", "id")?,
        submission_id: uuid_col(row, "submission_values", "submission_id")?,
        field_id: uuid_col(row, "submission_values", "field_id")?,
        value: row.try_get("value")?,
    })
}

fn options_json(options: Option<&Vec<String>>) -> StoreResult<Option<String>> {
    options
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| corrupt("fields", format!("options: {err}")))
}

/// Maps constraint violations onto the store's error vocabulary.
fn classify(err: sqlx::Error, entity: &'static str, key: &'static str, value: String) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate { entity, key, value };
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound {
                entity: "parent row",
                id: value,
            };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl FormStore for SqliteStore {
    async fn insert_form(&self, form: Form) -> StoreResult<Form> {
        sqlx::query(
            "INSERT INTO forms (id, name, description, status, public_url, media_type, media_url, \
             tutorial_video_url, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(form.id.to_string())
        .bind(&form.name)
        .bind(&form.description)
        .bind(form.status.as_str())
        .bind(&form.public_url)
        .bind(form.media_type.as_str())
        .bind(&form.media_url)
        .bind(&form.tutorial_video_url)
        .bind(ts(&form.created_at))
        .bind(ts(&form.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|err| classify(err, "form", "public_url", form.public_url.clone()))?;
        Ok(form)
    }

    async fn update_form(
        &self,
        id: FormId,
        update: FormUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Form> {
        let row = sqlx::query(
            "UPDATE forms SET name = ?, description = ?, status = ?, media_type = ?, \
             media_url = ?, tutorial_video_url = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.status.as_str())
        .bind(update.media_type.as_str())
        .bind(&update.media_url)
        .bind(&update.tutorial_video_url)
        .bind(ts(&at))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(form_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("form", id))
    }

    async fn delete_form(&self, id: FormId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("form", id));
        }
        Ok(())
    }

    async fn form(&self, id: FormId) -> StoreResult<Form> {
        self.find_form(id)
            .await?
            .ok_or_else(|| StoreError::not_found("form", id))
    }

    async fn find_form(&self, id: FormId) -> StoreResult<Option<Form>> {
        let row = sqlx::query("SELECT * FROM forms WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(form_from_row).transpose()
    }

    async fn form_by_slug(&self, slug: &str) -> StoreResult<Option<Form>> {
        let row = sqlx::query("SELECT * FROM forms WHERE public_url = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(form_from_row).transpose()
    }

    async fn list_forms(&self) -> StoreResult<Vec<Form>> {
        let rows = sqlx::query("SELECT * FROM forms ORDER BY created_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(form_from_row).collect()
    }

    async fn count_forms(&self, status: Option<FormStatus>) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM forms WHERE (?1 IS NULL OR status = ?1)")
                .bind(status.map(|status| status.as_str()))
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_fields(&self, fields: Vec<Field>) -> StoreResult<Vec<Field>> {
        let mut tx = self.pool.begin().await?;
        for field in &fields {
            let (depends_on, show_when) = match &field.condition {
                Some(condition) => (
                    Some(condition.depends_on_field_id.to_string()),
                    Some(condition.show_when_value.clone()),
                ),
                None => (None, None),
            };
            sqlx::query(&format!(
                "INSERT INTO fields ({FIELD_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(field.id.to_string())
            .bind(field.form_id.to_string())
            .bind(&field.label)
            .bind(field.kind.as_str())
            .bind(field.required)
            .bind(&field.placeholder)
            .bind(options_json(field.options.as_ref())?)
            .bind(field.order)
            .bind(field.enabled)
            .bind(depends_on)
            .bind(show_when)
            .bind(ts(&field.created_at))
            .bind(ts(&field.updated_at))
            .execute(&mut *tx)
            .await
            .map_err(|err| classify(err, "field", "id", field.id.to_string()))?;
        }
        tx.commit().await?;
        Ok(fields)
    }

    async fn update_field(
        &self,
        id: FieldId,
        update: FieldUpdate,
        at: DateTime<Utc>,
    ) -> StoreResult<Field> {
        let (depends_on, show_when) = match &update.condition {
            Some(condition) => (
                Some(condition.depends_on_field_id.to_string()),
                Some(condition.show_when_value.clone()),
            ),
            None => (None, None),
        };
        let row = sqlx::query(
            "UPDATE fields SET label = ?, type = ?, required = ?, placeholder = ?, options = ?, \
             enabled = ?, depends_on_field_id = ?, show_when_value = ?, updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(&update.label)
        .bind(update.kind.as_str())
        .bind(update.required)
        .bind(&update.placeholder)
        .bind(options_json(update.options.as_ref())?)
        .bind(update.enabled)
        .bind(depends_on)
        .bind(show_when)
        .bind(ts(&at))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(field_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("field", id))
    }

    async fn set_field_order(
        &self,
        id: FieldId,
        order: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<Field> {
        let row =
            sqlx::query("UPDATE fields SET sort_order = ?, updated_at = ? WHERE id = ? RETURNING *")
                .bind(order)
                .bind(ts(&at))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref()
            .map(field_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("field", id))
    }

    async fn delete_field(&self, id: FieldId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE fields SET depends_on_field_id = NULL, show_when_value = NULL \
             WHERE depends_on_field_id = ?",
        )
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM fields WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("field", id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn field(&self, id: FieldId) -> StoreResult<Field> {
        let row = sqlx::query(&format!("SELECT {FIELD_COLUMNS} FROM fields WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(field_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("field", id))
    }

    async fn list_fields(&self, form_id: FormId, enabled_only: bool) -> StoreResult<Vec<Field>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE form_id = ? AND (? = 0 OR enabled = 1) \
             ORDER BY sort_order, created_at, rowid"
        ))
        .bind(form_id.to_string())
        .bind(enabled_only)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(field_from_row).collect()
    }

    async fn list_all_fields(&self) -> StoreResult<Vec<Field>> {
        let rows = sqlx::query(
            "SELECT f.id, f.form_id, f.label, f.type, f.required, f.placeholder, f.options, \
             f.sort_order, f.enabled, f.depends_on_field_id, f.show_when_value, f.created_at, \
             f.updated_at FROM fields f JOIN forms ON forms.id = f.form_id \
             ORDER BY forms.rowid, f.sort_order, f.created_at, f.rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(field_from_row).collect()
    }

    async fn max_field_order(&self, form_id: FormId) -> StoreResult<Option<i64>> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sort_order) FROM fields WHERE form_id = ?")
                .bind(form_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn insert_submission(&self, submission: Submission) -> StoreResult<Submission> {
        sqlx::query("INSERT INTO submissions (id, form_id, created_at) VALUES (?, ?, ?)")
            .bind(submission.id.to_string())
            .bind(submission.form_id.to_string())
            .bind(ts(&submission.created_at))
            .execute(&self.pool)
            .await
            .map_err(|err| classify(err, "submission", "id", submission.id.to_string()))?;
        Ok(submission)
    }

    async fn insert_values(
        &self,
        values: Vec<SubmissionValue>,
    ) -> StoreResult<Vec<SubmissionValue>> {
        let mut tx = self.pool.begin().await?;
        for value in &values {
            sqlx::query(
                "INSERT INTO submission_values (id, submission_id, field_id, value) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(value.id.to_string())
            .bind(value.submission_id.to_string())
            .bind(value.field_id.to_string())
            .bind(&value.value)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                classify(err, "submission value", "field_id", value.field_id.to_string())
            })?;
        }
        tx.commit().await?;
        Ok(values)
    }

    async fn list_submissions(&self, form_id: Option<FormId>) -> StoreResult<Vec<Submission>> {
        let rows = sqlx::query(
            "SELECT * FROM submissions WHERE (?1 IS NULL OR form_id = ?1) \
             ORDER BY created_at, rowid",
        )
        .bind(form_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(submission_from_row).collect()
    }

    async fn list_values(
        &self,
        submission_ids: &[SubmissionId],
    ) -> StoreResult<Vec<SubmissionValue>> {
        let mut values = Vec::new();
        for chunk in submission_ids.chunks(IN_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT * FROM submission_values WHERE submission_id IN ({placeholders}) \
                 ORDER BY rowid"
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.to_string());
            }
            let rows = query.fetch_all(&self.pool).await?;
            for row in &rows {
                values.push(value_from_row(row)?);
            }
        }
        Ok(values)
    }

    async fn delete_submission(&self, id: SubmissionId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM submissions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("submission", id));
        }
        Ok(())
    }

    async fn count_submissions(&self, form_id: Option<FormId>) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions WHERE (?1 IS NULL OR form_id = ?1)",
        )
        .bind(form_id.map(|id| id.to_string()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn submission_counts(&self) -> StoreResult<BTreeMap<FormId, u64>> {
        let rows = sqlx::query(
            "SELECT form_id, COUNT(*) AS submissions FROM submissions GROUP BY form_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut counts = BTreeMap::new();
        for row in &rows {
            let count: i64 = row.try_get("submissions")?;
            counts.insert(uuid_col(row, "submissions", "form_id")?, count.max(0) as u64);
        }
        Ok(counts)
    }
}
