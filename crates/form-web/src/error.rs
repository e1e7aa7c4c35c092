use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use form_service::ServiceError;
use form_spec::RenderError;
use thiserror::Error;
use tracing::error;

use crate::models::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("{0}")]
    BadRequest(String),
    #[error("page rendering failed: {0}")]
    Render(#[from] RenderError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::ConfirmationRequired { .. } | ServiceError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                ServiceError::Definition(_) => StatusCode::BAD_REQUEST,
                ServiceError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::PartialWrite { .. } | ServiceError::Export(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::NotFound { .. } => "not_found",
                ServiceError::Validation(_) => "validation_failed",
                ServiceError::ConfirmationRequired { .. } => "confirmation_required",
                ServiceError::Conflict(_) => "conflict",
                ServiceError::Definition(_) => "invalid_definition",
                ServiceError::BackendUnavailable(_) => "backend_unavailable",
                ServiceError::PartialWrite { .. } => "partial_write",
                ServiceError::Export(_) => "export_failed",
            },
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Render(_) => "render_failed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        match self {
            ApiError::Service(ServiceError::Validation(result)) => {
                let message = format!("{} field(s) need attention", result.errors.len());
                (
                    status,
                    Json(ApiResponse::failure(code, &message, Some(result))),
                )
                    .into_response()
            }
            other => {
                if status.is_server_error() {
                    error!(code, error = %other, "request failed");
                }
                (status, Json(ApiResponse::error(code, &other.to_string()))).into_response()
            }
        }
    }
}
