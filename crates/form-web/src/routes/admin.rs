//! Admin API. Every route here sits behind the session guard.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use form_service::{Confirmation, Dashboard, FormSummary};
use form_spec::{
    Field, FieldId, FieldUpdate, Form, FormDefinition, FormId, FormTemplate, FormUpdate,
    LocationPin, NewField, NewForm, SubmissionId, SubmissionQuery, SubmissionRecord,
    builtin_templates,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::models::{
    ApiResponse, ConfirmParams, MoveRequest, ScopeParams, SubmissionParams,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/api/dashboard", get(dashboard))
        .route("/api/forms", get(list_forms).post(create_form))
        .route(
            "/api/forms/:id",
            get(form_definition).put(update_form).delete(delete_form),
        )
        .route("/api/forms/:id/fields", post(add_field))
        .route("/api/forms/:id/fields/renumber", post(renumber_fields))
        .route("/api/fields/:id", put(update_field).delete(delete_field))
        .route("/api/fields/:id/move", post(move_field))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/:key", post(instantiate_template))
        .route("/api/submissions", get(list_submissions))
        .route(
            "/api/submissions/export",
            get(export_submissions).post(save_export),
        )
        .route("/api/submissions/:id", axum::routing::delete(delete_submission))
        .route("/api/locations", get(locations))
}

#[derive(Debug, Serialize)]
struct Overview {
    dashboard: Dashboard,
    forms: Vec<FormSummary>,
}

/// Landing page data. Degrades to zeros and an empty list when the backend is down.
async fn overview(State(state): State<AppState>) -> Json<ApiResponse<Overview>> {
    let browser = state.service.submissions();
    Json(ApiResponse::success(Overview {
        dashboard: browser.dashboard().await,
        forms: browser.form_summaries().await,
    }))
}

async fn dashboard(State(state): State<AppState>) -> Json<ApiResponse<Dashboard>> {
    Json(ApiResponse::success(
        state.service.submissions().dashboard().await,
    ))
}

async fn list_forms(State(state): State<AppState>) -> Json<ApiResponse<Vec<FormSummary>>> {
    Json(ApiResponse::success(
        state.service.submissions().form_summaries().await,
    ))
}

#[derive(Debug, Serialize)]
struct CreatedForm {
    #[serde(flatten)]
    form: Form,
    link: String,
}

async fn create_form(
    State(state): State<AppState>,
    Json(new): Json<NewForm>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CreatedForm>>)> {
    let form = state.service.editor().create_form(new).await?;
    let link = state.settings.web.form_link(&form.public_url);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedForm { form, link })),
    ))
}

async fn form_definition(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
) -> ApiResult<Json<ApiResponse<FormDefinition>>> {
    let definition = state.service.editor().form_definition(id).await?;
    Ok(Json(ApiResponse::success(definition)))
}

async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    Json(update): Json<FormUpdate>,
) -> ApiResult<Json<ApiResponse<Form>>> {
    let form = state.service.editor().update_form(id, update).await?;
    Ok(Json(ApiResponse::success(form)))
}

async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<StatusCode> {
    state
        .service
        .editor()
        .delete_form(id, Confirmation::from_flag(params.confirm))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_field(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
    Json(new): Json<NewField>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Field>>)> {
    let field = state.service.editor().add_field(id, new).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(field))))
}

async fn renumber_fields(
    State(state): State<AppState>,
    Path(id): Path<FormId>,
) -> ApiResult<Json<ApiResponse<Vec<Field>>>> {
    let fields = state.service.editor().normalize_order(id).await?;
    Ok(Json(ApiResponse::success(fields)))
}

async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<FieldId>,
    Json(update): Json<FieldUpdate>,
) -> ApiResult<Json<ApiResponse<Field>>> {
    let field = state.service.editor().update_field(id, update).await?;
    Ok(Json(ApiResponse::success(field)))
}

async fn delete_field(
    State(state): State<AppState>,
    Path(id): Path<FieldId>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<StatusCode> {
    state
        .service
        .editor()
        .delete_field(id, Confirmation::from_flag(params.confirm))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Swaps the field with its neighbour and returns the reloaded field list.
async fn move_field(
    State(state): State<AppState>,
    Path(id): Path<FieldId>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<Json<ApiResponse<Vec<Field>>>> {
    let fields = state
        .service
        .editor()
        .move_field(id, request.direction)
        .await?;
    Ok(Json(ApiResponse::success(fields)))
}

async fn list_templates() -> Json<ApiResponse<Vec<FormTemplate>>> {
    Json(ApiResponse::success(builtin_templates()))
}

async fn instantiate_template(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiResponse<FormDefinition>>)> {
    let definition = state.service.editor().instantiate_template(&key).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(definition))))
}

async fn list_submissions(
    State(state): State<AppState>,
    Query(params): Query<SubmissionParams>,
) -> ApiResult<Json<ApiResponse<Vec<SubmissionRecord>>>> {
    let query = SubmissionQuery::from(params);
    let records = state.service.submissions().query(&query).await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn export_submissions(
    State(state): State<AppState>,
    Query(params): Query<SubmissionParams>,
) -> ApiResult<Response> {
    let query = SubmissionQuery::from(params);
    let file = state.service.submissions().export(&query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct SavedExport {
    path: String,
}

/// Writes the export into the configured export directory on the server.
async fn save_export(
    State(state): State<AppState>,
    Query(params): Query<SubmissionParams>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SavedExport>>)> {
    let query = SubmissionQuery::from(params);
    let path = state
        .service
        .submissions()
        .export_to_dir(&query, &state.settings.export.directory)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SavedExport {
            path: path.display().to_string(),
        })),
    ))
}

async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<SubmissionId>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<StatusCode> {
    state
        .service
        .submissions()
        .delete_submission(id, Confirmation::from_flag(params.confirm))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn locations(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> ApiResult<Json<ApiResponse<Vec<LocationPin>>>> {
    let pins = state.service.submissions().locations(params.scope()).await?;
    Ok(Json(ApiResponse::success(pins)))
}
