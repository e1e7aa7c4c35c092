//! Public form page and the JSON endpoints it talks to.

use std::collections::BTreeMap;

use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router, async_trait};
use form_service::{AnswerChange, ServiceError};
use form_spec::{AnswerMap, FieldId, join_choices, render_html, render_json_ui, render_not_found};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::{ApiResponse, GeocodeParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forms/:slug", get(form_json))
        .route("/forms/:slug/submissions", post(submit))
        .route("/forms/:slug/answers", post(preview))
        .route("/geocode/reverse", get(reverse_geocode))
}

/// Answers posted either as a JSON object keyed by field id or as an HTML
/// form, where checkbox groups repeat the field id once per ticked option.
#[derive(Debug)]
pub enum AnswerPayload {
    Json(AnswerMap),
    Form(AnswerMap),
}

#[async_trait]
impl<S> FromRequest<S> for AnswerPayload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(AnswerPayload::Form(collect_form_answers(pairs)))
        } else {
            let Json(answers) = Json::<AnswerMap>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(AnswerPayload::Json(answers))
        }
    }
}

fn collect_form_answers(pairs: Vec<(String, String)>) -> AnswerMap {
    let mut grouped: BTreeMap<FieldId, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        let Ok(field_id) = name.parse::<FieldId>() else {
            continue;
        };
        if !value.trim().is_empty() {
            grouped.entry(field_id).or_default().push(value);
        }
    }
    grouped
        .into_iter()
        .map(|(field_id, values)| (field_id, join_choices(&values)))
        .collect()
}

/// `GET /form/{slug}`: the rendered form, or a 404 page unless the form is active.
pub async fn form_page(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Response> {
    match state.service.public_payload(&slug, &AnswerMap::new(), None).await {
        Ok(payload) => Ok(Html(render_html(&payload)?).into_response()),
        Err(ServiceError::NotFound { .. }) => {
            debug!(slug = %slug, "public form not found");
            Ok((StatusCode::NOT_FOUND, Html(render_not_found(&slug)?)).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

async fn form_json(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let payload = state
        .service
        .public_payload(&slug, &AnswerMap::new(), None)
        .await?;
    Ok(Json(ApiResponse::success(render_json_ui(&payload))))
}

async fn submit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: AnswerPayload,
) -> ApiResult<Response> {
    match payload {
        AnswerPayload::Json(answers) => {
            let receipt = state.service.intake().submit(&slug, answers).await?;
            Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))).into_response())
        }
        AnswerPayload::Form(answers) => {
            match state.service.intake().submit(&slug, answers.clone()).await {
                Ok(_) => Ok(Redirect::to(&format!("/form/{slug}")).into_response()),
                Err(ServiceError::Validation(result)) => {
                    let page = state
                        .service
                        .public_payload(&slug, &answers, Some(&result))
                        .await?;
                    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(render_html(&page)?)).into_response())
                }
                Err(ServiceError::NotFound { .. }) => {
                    Ok((StatusCode::NOT_FOUND, Html(render_not_found(&slug)?)).into_response())
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

async fn preview(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(change): Json<AnswerChange>,
) -> ApiResult<Json<ApiResponse<form_service::AnswerPreview>>> {
    let preview = state.service.intake().preview(&slug, change).await?;
    Ok(Json(ApiResponse::success(preview)))
}

/// Always answers with the coordinate; the address is present only when the
/// lookup succeeded.
async fn reverse_geocode(
    State(state): State<AppState>,
    Query(params): Query<GeocodeParams>,
) -> ApiResult<Json<ApiResponse<form_spec::GeoPoint>>> {
    let point = state
        .service
        .reverse_geocode(params.lat, params.lng)
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(Json(ApiResponse::success(point)))
}
