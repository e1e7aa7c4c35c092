use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use form_service::{
    FormService, GeocodeError, GeocodingConfig, NominatimGeocoder, ReverseGeocoder,
    resolve_address,
};
use form_spec::{CaptureSource, LocationCapture};
use form_store::MemoryStore;
use serde_json::{Value, json};

async fn reverse(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if params.get("format").map(String::as_str) != Some("jsonv2") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "format" })));
    }
    match (params.get("lat").map(String::as_str), params.get("lon").map(String::as_str)) {
        (Some("36.8"), Some("10.2")) => (
            StatusCode::OK,
            Json(json!({
                "display_name": "Tunis, Tunisia",
                "accept_language": params.get("accept-language"),
            })),
        ),
        (Some("0"), Some("0")) => (StatusCode::OK, Json(json!({ "error": "Unable to geocode" }))),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
    }
}

async fn fake_nominatim() -> String {
    let app = Router::new().route("/reverse", get(reverse));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/reverse")
}

fn config(endpoint: String) -> GeocodingConfig {
    GeocodingConfig {
        endpoint,
        timeout_ms: 2_000,
        ..GeocodingConfig::default()
    }
}

#[tokio::test]
async fn nominatim_reply_becomes_an_address() {
    let geocoder = NominatimGeocoder::new(&config(fake_nominatim().await)).expect("client");
    let address = geocoder.reverse(36.8, 10.2).await.expect("address");
    assert_eq!(address, "Tunis, Tunisia");

    let missing = geocoder.reverse(0.0, 0.0).await.expect_err("no address");
    assert!(matches!(missing, GeocodeError::NoAddress), "{missing}");

    let status = geocoder.reverse(1.0, 1.0).await.expect_err("server error");
    assert!(matches!(status, GeocodeError::Status(500)), "{status}");
}

#[tokio::test]
async fn failed_lookup_keeps_the_coordinate_only() {
    let geocoder = NominatimGeocoder::new(&config(fake_nominatim().await)).expect("client");

    let mut capture = LocationCapture::new();
    let ticket = capture
        .pick(1.0, 1.0, CaptureSource::MapClick)
        .expect("valid pick");
    assert!(!resolve_address(&mut capture, ticket, &geocoder).await);
    assert_eq!(capture.to_answer().as_deref(), Some(r#"{"lat":1.0,"lng":1.0}"#));

    let ticket = capture
        .pick(36.8, 10.2, CaptureSource::MapClick)
        .expect("valid pick");
    assert!(resolve_address(&mut capture, ticket, &geocoder).await);
    assert_eq!(
        capture.point().and_then(|point| point.address.as_deref()),
        Some("Tunis, Tunisia")
    );
}

#[tokio::test]
async fn unreachable_geocoder_never_blocks_the_answer() {
    let service = FormService::new(
        Arc::new(MemoryStore::new()),
        config("http://127.0.0.1:9/reverse".to_string()),
    );
    let point = service.reverse_geocode(36.8, 10.2).await.expect("coordinate");
    assert_eq!(point.address, None);
    assert_eq!((point.lat, point.lng), (36.8, 10.2));
    assert!(service.reverse_geocode(120.0, 10.2).await.is_err());

    let disabled = FormService::new(
        Arc::new(MemoryStore::new()),
        GeocodingConfig {
            enabled: false,
            ..GeocodingConfig::default()
        },
    );
    let point = disabled.reverse_geocode(36.8, 10.2).await.expect("coordinate");
    assert_eq!(point.address, None);
}

#[tokio::test]
async fn service_shares_one_geocoder() {
    let endpoint = fake_nominatim().await;
    let service = FormService::new(Arc::new(MemoryStore::new()), config(endpoint));
    let first = service.geocoder().await.expect("geocoder");
    let second = service.geocoder().await.expect("geocoder");
    assert!(Arc::ptr_eq(&first, &second));

    let point = service.reverse_geocode(36.8, 10.2).await.expect("point");
    assert_eq!(point.address.as_deref(), Some("Tunis, Tunisia"));
}

struct FixedGeocoder;

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn reverse(&self, _lat: f64, _lng: f64) -> Result<String, GeocodeError> {
        Ok("Sfax, Tunisia".to_string())
    }
}

#[tokio::test]
async fn injected_geocoder_replaces_one_already_built() {
    let service = FormService::new(
        Arc::new(MemoryStore::new()),
        GeocodingConfig {
            enabled: false,
            ..GeocodingConfig::default()
        },
    );
    let point = service.reverse_geocode(34.7, 10.7).await.expect("coordinate");
    assert_eq!(point.address, None);

    let fixed: Arc<dyn ReverseGeocoder> = Arc::new(FixedGeocoder);
    let service = service.with_geocoder(Arc::clone(&fixed));
    let current = service.geocoder().await.expect("geocoder");
    assert!(Arc::ptr_eq(&current, &fixed));

    let point = service.reverse_geocode(34.7, 10.7).await.expect("point");
    assert_eq!(point.address.as_deref(), Some("Sfax, Tunisia"));
}
