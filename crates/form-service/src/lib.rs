//! Application services over a [`FormStore`]: the admin editor, public
//! intake, submission browsing and reverse geocoding.

mod editor;
mod error;
mod geocode;
mod intake;
mod loader;
mod submissions;

use std::sync::Arc;

use form_spec::{
    AnswerMap, GeoPoint, GeoPointError, RenderError, RenderPayload, ValidationResult,
    build_render_payload, render_html, render_json_ui, render_text,
};
use form_store::FormStore;
use serde_json::Value;
use tracing::{debug, warn};

pub use editor::{FormEditor, MoveDirection, random_slug};
pub use error::{Confirmation, ServiceError, ServiceResult};
pub use geocode::{
    DisabledGeocoder, GeocodeError, GeocodingConfig, NominatimGeocoder, ReverseGeocoder,
    geocoder_from_config, locate, resolve_address,
};
pub use intake::{AnswerChange, AnswerPreview, FormIntake, SubmissionReceipt};
pub use loader::SharedLoader;
pub use submissions::{CSV_CONTENT_TYPE, Dashboard, ExportFile, FormSummary, SubmissionBrowser};

/// A public form rendered in one output format.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedForm {
    Json(Value),
    Text(String),
    Html(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Json,
    Text,
    Html,
}

pub fn render_payload(payload: &RenderPayload, format: RenderFormat) -> Result<RenderedForm, RenderError> {
    Ok(match format {
        RenderFormat::Json => RenderedForm::Json(render_json_ui(payload)),
        RenderFormat::Text => RenderedForm::Text(render_text(payload)),
        RenderFormat::Html => RenderedForm::Html(render_html(payload)?),
    })
}

/// Entry point shared by the web server and the command line.
pub struct FormService {
    store: Arc<dyn FormStore>,
    geocoding: GeocodingConfig,
    geocoder: SharedLoader<Arc<dyn ReverseGeocoder>>,
}

impl FormService {
    pub fn new(store: Arc<dyn FormStore>, geocoding: GeocodingConfig) -> Self {
        Self {
            store,
            geocoding,
            geocoder: SharedLoader::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn FormStore> {
        &self.store
    }

    pub fn editor(&self) -> FormEditor {
        FormEditor::new(Arc::clone(&self.store))
    }

    pub fn intake(&self) -> FormIntake {
        FormIntake::new(Arc::clone(&self.store))
    }

    pub fn submissions(&self) -> SubmissionBrowser {
        SubmissionBrowser::new(Arc::clone(&self.store))
    }

    /// Render payload of an active form for the given in-progress answers.
    pub async fn public_payload(
        &self,
        slug: &str,
        answers: &AnswerMap,
        validation: Option<&ValidationResult>,
    ) -> ServiceResult<RenderPayload> {
        let definition = self.intake().load_public_form(slug).await?;
        Ok(build_render_payload(
            &definition.form,
            &definition.fields,
            answers,
            validation,
        ))
    }

    /// The geocoder, built on first use and shared afterwards.
    pub async fn geocoder(&self) -> Result<Arc<dyn ReverseGeocoder>, GeocodeError> {
        self.geocoder
            .get_or_load(|| async { geocoder_from_config(&self.geocoding) })
            .await
            .map(Arc::clone)
    }

    /// Uses `geocoder` instead of the configured one, also when a geocoder
    /// was already built.
    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        if self.geocoder.is_ready() {
            debug!("replacing the geocoder already in use");
        }
        self.geocoder = SharedLoader::ready(geocoder);
        self
    }

    /// The coordinate with an address attached when the lookup succeeds. A
    /// geocoder that cannot be built is treated like a failed lookup.
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<GeoPoint, GeoPointError> {
        match self.geocoder().await {
            Ok(geocoder) => locate(geocoder.as_ref(), lat, lng).await,
            Err(err) => {
                warn!(error = %err, "geocoder unavailable");
                GeoPoint::new(lat, lng)
            }
        }
    }
}
