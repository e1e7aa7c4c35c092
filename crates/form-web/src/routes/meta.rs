use axum::Json;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};

pub const MANIFEST_CONTENT_TYPE: &str = "application/manifest+json";

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Static web app manifest of the admin dashboard.
pub async fn manifest() -> impl IntoResponse {
    let manifest = json!({
        "name": "لوحة التحكم - Forms Builder",
        "short_name": "لوحة التحكم",
        "description": "إدارة النماذج والإرسالات",
        "start_url": "/admin",
        "display": "standalone",
        "background_color": "#ffffff",
        "theme_color": "#2563eb",
        "orientation": "portrait",
        "icons": [
            { "src": "/favicon.ico", "sizes": "any", "type": "image/x-icon" }
        ],
    });
    (
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        manifest.to_string(),
    )
}
