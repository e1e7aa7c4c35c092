//! Reverse geocoding of picked coordinates. Lookups are best effort: any
//! failure leaves the coordinate without an address.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use form_spec::{GeoPoint, GeoPointError, LocationCapture, LookupTicket};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    /// Nominatim-compatible `/reverse` endpoint.
    pub endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("form-builder/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "ar".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("reverse geocoding is disabled")]
    Disabled,
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder answered with status {0}")]
    Status(u16),
    #[error("geocoder returned no address")]
    NoAddress,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<String, GeocodeError>;
}

/// Geocoder used when lookups are switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn reverse(&self, _lat: f64, _lng: f64) -> Result<String, GeocodeError> {
        Err(GeocodeError::Disabled)
    }
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct ReverseReply {
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<String, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        let reply: ReverseReply = response.json().await?;
        reply
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(GeocodeError::NoAddress)
    }
}

pub fn geocoder_from_config(
    config: &GeocodingConfig,
) -> Result<Arc<dyn ReverseGeocoder>, GeocodeError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledGeocoder));
    }
    Ok(Arc::new(NominatimGeocoder::new(config)?))
}

/// Builds a point for the coordinate, with an address when the lookup works.
pub async fn locate(
    geocoder: &dyn ReverseGeocoder,
    lat: f64,
    lng: f64,
) -> Result<GeoPoint, GeoPointError> {
    let mut point = GeoPoint::new(lat, lng)?;
    match geocoder.reverse(lat, lng).await {
        Ok(address) => point.address = Some(address),
        Err(err) => debug!(error = %err, "reverse geocoding skipped"),
    }
    Ok(point)
}

/// Completes the address step of a pick. Returns whether an address was
/// attached; a later pick or a failed lookup leaves the capture as it is.
pub async fn resolve_address(
    capture: &mut LocationCapture,
    ticket: LookupTicket,
    geocoder: &dyn ReverseGeocoder,
) -> bool {
    let Some((lat, lng)) = capture.point().map(|point| (point.lat, point.lng)) else {
        return false;
    };
    match geocoder.reverse(lat, lng).await {
        Ok(address) => capture.attach_address(ticket, address),
        Err(err) => {
            debug!(error = %err, "reverse geocoding skipped");
            false
        }
    }
}
