//! Location capture: a coordinate picked on a map or read from the device,
//! optionally enriched with a reverse-geocoded address.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialized form of a `location` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoPointError {
    #[error("location answer is not a JSON object with lat/lng: {0}")]
    Malformed(String),
    #[error("coordinate ({lat}, {lng}) is out of range")]
    OutOfRange { lat: f64, lng: f64 },
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoPointError> {
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(GeoPointError::OutOfRange { lat, lng });
        }
        Ok(Self {
            lat,
            lng,
            address: None,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, GeoPointError> {
        let point: GeoPoint = serde_json::from_str(raw)
            .map_err(|error| GeoPointError::Malformed(error.to_string()))?;
        let checked = GeoPoint::new(point.lat, point.lng)?;
        Ok(GeoPoint {
            address: point.address.filter(|address| !address.trim().is_empty()),
            ..checked
        })
    }

    pub fn to_answer(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"lat\":{},\"lng\":{}}}", self.lat, self.lng)
        })
    }
}

/// Where a picked coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    MapClick,
    Device,
}

/// Why the device could not provide a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationFailure {
    #[error("location permission was denied")]
    PermissionDenied,
    #[error("this device does not support geolocation")]
    Unsupported,
    #[error("timed out waiting for the device location")]
    Timeout,
}

/// Non-blocking message shown next to the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

/// Identifies the pick an address lookup was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupTicket(u64);

/// `Unset -> Set(lat,lng) -> Set(lat,lng,address)`; a new pick always overwrites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationCapture {
    current: Option<GeoPoint>,
    generation: u64,
}

impl LocationCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the state of a previously serialized answer. Unparseable input starts unset.
    pub fn from_answer(raw: &str) -> Self {
        match GeoPoint::parse(raw) {
            Ok(point) => Self {
                current: Some(point),
                generation: 0,
            },
            Err(_) => Self::default(),
        }
    }

    pub fn point(&self) -> Option<&GeoPoint> {
        self.current.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }

    /// Records a picked coordinate and returns the ticket for its address lookup.
    pub fn pick(
        &mut self,
        lat: f64,
        lng: f64,
        _source: CaptureSource,
    ) -> Result<LookupTicket, GeoPointError> {
        let point = GeoPoint::new(lat, lng)?;
        self.generation += 1;
        self.current = Some(point);
        Ok(LookupTicket(self.generation))
    }

    /// Applies a device geolocation result. Failures leave the state untouched.
    pub fn apply_device_position(
        &mut self,
        position: Result<(f64, f64), GeolocationFailure>,
    ) -> Result<LookupTicket, Notice> {
        match position {
            Ok((lat, lng)) => self
                .pick(lat, lng, CaptureSource::Device)
                .map_err(|error| Notice {
                    message: error.to_string(),
                }),
            Err(failure) => Err(Notice {
                message: failure.to_string(),
            }),
        }
    }

    /// Attaches an address if the ticket still refers to the current pick.
    pub fn attach_address(&mut self, ticket: LookupTicket, address: impl Into<String>) -> bool {
        if ticket.0 != self.generation {
            return false;
        }
        let address = address.into();
        match self.current.as_mut() {
            Some(point) if !address.trim().is_empty() => {
                point.address = Some(address);
                true
            }
            _ => false,
        }
    }

    pub fn to_answer(&self) -> Option<String> {
        self.current.as_ref().map(GeoPoint::to_answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_click_without_address_serializes_coordinates_only() {
        let mut capture = LocationCapture::new();
        capture
            .pick(36.8, 10.2, CaptureSource::MapClick)
            .expect("valid coordinate");
        assert_eq!(
            capture.to_answer().as_deref(),
            Some(r#"{"lat":36.8,"lng":10.2}"#)
        );
    }

    #[test]
    fn stale_lookup_does_not_overwrite_newer_pick() {
        let mut capture = LocationCapture::new();
        let first = capture
            .pick(36.8, 10.2, CaptureSource::MapClick)
            .expect("valid coordinate");
        let second = capture
            .pick(35.0, 9.0, CaptureSource::MapClick)
            .expect("valid coordinate");
        assert!(!capture.attach_address(first, "Tunis"));
        assert!(capture.attach_address(second, "Kairouan"));
        let point = capture.point().expect("set");
        assert_eq!(point.lat, 35.0);
        assert_eq!(point.address.as_deref(), Some("Kairouan"));
    }

    #[test]
    fn device_failure_keeps_previous_state_and_reports_notice() {
        let mut capture = LocationCapture::new();
        capture
            .pick(36.8, 10.2, CaptureSource::MapClick)
            .expect("valid coordinate");
        let notice = capture
            .apply_device_position(Err(GeolocationFailure::PermissionDenied))
            .expect_err("notice");
        assert!(notice.message.contains("denied"));
        assert_eq!(capture.point().map(|point| point.lat), Some(36.8));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::parse(r#"{"lat":"x","lng":1}"#).is_err());
        assert!(GeoPoint::parse("not json").is_err());
    }
}
