//! Admin sign-in: argon2 password check, cookie sessions and the guard in
//! front of the admin routes.

use std::collections::HashMap;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{OriginalUri, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::debug;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "form_builder_session";
pub const LOGIN_PATH: &str = "/auth/login";
pub const ADMIN_HOME: &str = "/admin";
const TOKEN_LEN: usize = 48;
/// Longest accepted session lifetime, one year.
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt)?;
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// False for a wrong password and for a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            debug!(error = %err, "stored password hash is malformed");
            false
        }
    }
}

#[derive(Debug)]
struct Session {
    email: String,
    expires_at: DateTime<Utc>,
}

/// In-process session table keyed by the cookie token.
#[derive(Debug)]
pub struct SessionStore {
    ttl: TimeDelta,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    /// Lifetimes above [`MAX_SESSION_TTL_SECS`] are capped.
    pub fn new(ttl_secs: u64) -> Self {
        let secs = ttl_secs.min(MAX_SESSION_TTL_SECS) as i64;
        Self {
            ttl: TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::zero()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn create(&self, email: &str) -> String {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect::<String>();
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                email: email.to_string(),
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
        token
    }

    /// Email of the signed-in admin when the token names a live session.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.lock();
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.email.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, token: &str) {
        self.sessions.lock().remove(token);
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, ttl_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}")
}

pub fn cleared_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Keeps redirects on this site: only absolute local paths are accepted.
pub fn safe_redirect(target: Option<&str>) -> String {
    match target.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => ADMIN_HOME.to_string(),
    }
}

pub fn login_redirect(target: &str) -> String {
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(target))
}

/// Lets requests with a live session through and sends everyone else to the
/// login page with the requested path as redirect target.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let signed_in = session_token(request.headers())
        .and_then(|token| state.sessions.lookup(&token))
        .is_some();
    if signed_in {
        return next.run(request).await;
    }
    let requested = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let target = requested
        .path_and_query()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| ADMIN_HOME.to_string());
    debug!(path = requested.path(), "admin request without session");
    Redirect::to(&login_redirect(&target)).into_response()
}
