use form_spec::{DefinitionError, ExportError, ValidationResult};
use form_store::StoreError;
use thiserror::Error;
use tracing::{debug, warn};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Per-field problems; nothing was written.
    #[error("{} field(s) failed validation", .0.errors.len())]
    Validation(ValidationResult),

    #[error("the form service is temporarily unavailable, please retry")]
    BackendUnavailable(#[source] StoreError),

    /// The first of two sequential writes succeeded and could not be undone.
    #[error("{completed}, but {failed}")]
    PartialWrite { completed: String, failed: String },

    #[error("{action} requires explicit confirmation")]
    ConfirmationRequired { action: &'static str },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("{0}")]
    Conflict(String),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StoreError::Duplicate { .. } => ServiceError::Conflict(err.to_string()),
            other => ServiceError::BackendUnavailable(other),
        }
    }
}

/// Logs a failed backend call and converts it. Not-found is expected control
/// flow and only logged at debug level.
pub(crate) fn backend(operation: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
    move |err| {
        if err.is_not_found() {
            debug!(operation, error = %err, "backend lookup found nothing");
        } else {
            warn!(operation, error = %err, "backend call failed");
        }
        ServiceError::from(err)
    }
}

/// Explicit answer to "are you sure?" for destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    #[default]
    Pending,
    Confirmed,
}

impl Confirmation {
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Pending
        }
    }

    pub(crate) fn require(self, action: &'static str) -> ServiceResult<()> {
        match self {
            Confirmation::Confirmed => Ok(()),
            Confirmation::Pending => Err(ServiceError::ConfirmationRequired { action }),
        }
    }
}
