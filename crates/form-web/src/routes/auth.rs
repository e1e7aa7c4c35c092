use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use form_spec::render_login;
use tracing::{info, warn};

use crate::auth::{
    cleared_cookie, safe_redirect, session_cookie, session_token, verify_password, LOGIN_PATH,
};
use crate::error::ApiResult;
use crate::models::{LoginForm, LoginParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

/// Signed-in admins go straight to the target; everyone else gets the form.
async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LoginParams>,
) -> ApiResult<Response> {
    let target = safe_redirect(params.redirect.as_deref());
    let signed_in = session_token(&headers)
        .and_then(|token| state.sessions.lookup(&token))
        .is_some();
    if signed_in {
        return Ok(Redirect::to(&target).into_response());
    }
    Ok(Html(render_login(LOGIN_PATH, &target, None)?).into_response())
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let target = safe_redirect(form.redirect.as_deref());
    let admin = &state.settings.admin;
    let email_matches = form.email.trim().eq_ignore_ascii_case(admin.email.trim());
    let accepted = match admin.password_hash.as_deref() {
        Some(hash) => email_matches && verify_password(&form.password, hash),
        None => {
            warn!("admin password hash is not configured, refusing sign-in");
            false
        }
    };
    if !accepted {
        let page = render_login(LOGIN_PATH, &target, Some("Invalid email or password"))?;
        return Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response());
    }

    let token = state.sessions.create(admin.email.trim());
    info!("admin signed in");
    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(&token, state.sessions.ttl_secs()),
        )],
        Redirect::to(&target),
    )
        .into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(&token);
    }
    (
        [(header::SET_COOKIE, cleared_cookie())],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}
