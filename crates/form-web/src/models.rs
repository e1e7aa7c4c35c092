//! Request and response bodies of the JSON API.

use form_service::MoveDirection;
use form_spec::{FormScope, SortDirection, SortKey, SubmissionQuery};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope of every JSON API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failure carrying a structured payload, e.g. per-field validation errors.
    pub fn failure(code: &str, message: &str, data: Option<T>) -> Self {
        Self {
            success: false,
            data,
            error: Some(ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: &str, message: &str) -> Self {
        Self::failure(code, message, None)
    }
}

/// `?confirm=true` on destructive requests.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ConfirmParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ScopeParams {
    #[serde(default)]
    pub form_id: Option<Uuid>,
}

impl ScopeParams {
    pub fn scope(&self) -> FormScope {
        self.form_id.map_or(FormScope::All, FormScope::One)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionParams {
    #[serde(default)]
    pub form_id: Option<Uuid>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub direction: Option<SortDirection>,
}

impl From<SubmissionParams> for SubmissionQuery {
    fn from(params: SubmissionParams) -> Self {
        SubmissionQuery {
            scope: params.form_id.map_or(FormScope::All, FormScope::One),
            search: params.search.filter(|term| !term.trim().is_empty()),
            sort: params.sort.unwrap_or_default(),
            direction: params.direction.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeocodeParams {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}
