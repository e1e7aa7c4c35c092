//! HTTP surface of the form builder.
//!
//! Public routes serve active forms and accept submissions; the admin API is
//! guarded by a cookie session obtained through `/auth/login`.

pub mod auth;
pub mod error;
pub mod models;
pub mod routes;
pub mod settings;
pub mod state;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use form_service::FormService;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ApiResult};
pub use models::ApiResponse;
pub use settings::Settings;
pub use state::AppState;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("could not open the form store: {0}")]
    Store(#[from] form_store::StoreError),
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn build_router(state: AppState) -> Router {
    let admin = routes::admin::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_session,
    ));

    Router::new()
        .route("/health", get(routes::meta::health))
        .route("/manifest.json", get(routes::meta::manifest))
        .route("/form/:slug", get(routes::public::form_page))
        .nest("/api", routes::public::router())
        .nest("/auth", routes::auth::router())
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Opens the store named in the settings and serves until the process stops.
pub async fn serve(settings: Settings) -> Result<(), WebError> {
    let store = form_store::open_store(&settings.db.url).await?;
    let service = FormService::new(store, settings.geocoding.clone());
    let addr = settings.web.bind.clone();
    let app = build_router(AppState::new(service, settings));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| WebError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "form builder listening");
    axum::serve(listener, app).await.map_err(WebError::Serve)
}
