use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Fetch-one found no row. Callers treat this as control flow, not a failure.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} with {key} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("database error: `{0}`")]
    Database(#[from] sqlx::Error),

    #[error("malformed {table} row: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::Database(sqlx::Error::RowNotFound)
        )
    }
}
