use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    answers::{AnswerMap, split_choices},
    field_type::{FieldType, Widget},
    location::GeoPoint,
    media::{MediaEmbed, form_media, tutorial_embed},
    spec::{field::Field, form::Form},
    validate::ValidationResult,
    visibility::{VisibilityMap, VisibilityMode, resolve_visibility},
};

const FORM_PAGE_TEMPLATE: &str = include_str!("templates/form_page.hbs");
const NOT_FOUND_TEMPLATE: &str = include_str!("templates/not_found.hbs");
const LOGIN_TEMPLATE: &str = include_str!("templates/login.hbs");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template registration failed: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("template rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Some visible required field is still unanswered.
    NeedInput,
    /// Every visible required field holds an answer.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone, Serialize)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(flatten)]
    pub widget: Widget,
    pub required: bool,
    /// `required` as declared, applied by the page once the field is shown.
    pub declared_required: bool,
    pub visible: bool,
    pub condition: Option<RenderCondition>,
    pub placeholder: Option<String>,
    pub options: Vec<RenderOption>,
    pub current_value: Option<String>,
    pub location: Option<GeoPoint>,
    pub error: Option<String>,
}

/// Controller of a conditional field, by field id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderCondition {
    pub depends_on: String,
    pub show_when: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderOption {
    pub value: String,
    pub selected: bool,
}

/// Collected payload used by the JSON, text and HTML renderers.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_name: String,
    pub description: Option<String>,
    pub public_url: String,
    pub status: &'static str,
    pub media: Option<MediaEmbed>,
    pub tutorial: Option<MediaEmbed>,
    pub answered: usize,
    pub total: usize,
    pub fields: Vec<RenderField>,
}

/// Builds the payload for `fields` (already filtered to the public set).
pub fn build_render_payload(
    form: &Form,
    fields: &[Field],
    answers: &AnswerMap,
    validation: Option<&ValidationResult>,
) -> RenderPayload {
    let visibility = resolve_visibility(fields, answers, VisibilityMode::Hidden);
    let fields_out = fields
        .iter()
        .map(|field| render_field(field, answers, &visibility, validation))
        .collect::<Vec<_>>();

    let visible = fields_out.iter().filter(|field| field.visible);
    let total = visible.clone().count();
    let answered = visible
        .filter(|field| field.current_value.is_some())
        .count();
    let missing_required = fields_out
        .iter()
        .any(|field| field.visible && field.required && field.current_value.is_none());
    let status = if missing_required {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    RenderPayload {
        form_id: form.id.to_string(),
        form_name: form.name.clone(),
        description: form.description.clone(),
        public_url: form.public_url.clone(),
        status: status.as_str(),
        media: form_media(form),
        tutorial: tutorial_embed(form),
        answered,
        total,
        fields: fields_out,
    }
}

fn render_field(
    field: &Field,
    answers: &AnswerMap,
    visibility: &VisibilityMap,
    validation: Option<&ValidationResult>,
) -> RenderField {
    let visible = visibility.get(&field.id).copied().unwrap_or(false);
    let current_value = answers
        .get(&field.id)
        .filter(|value| !value.trim().is_empty())
        .cloned();
    let selected = match field.kind {
        FieldType::Checkbox => current_value.as_deref().map(split_choices).unwrap_or_default(),
        _ => current_value.iter().cloned().collect(),
    };
    let options = field
        .choices()
        .iter()
        .map(|option| RenderOption {
            value: option.clone(),
            selected: selected.contains(option),
        })
        .collect();
    let location = match field.kind {
        FieldType::Location => current_value
            .as_deref()
            .and_then(|raw| GeoPoint::parse(raw).ok()),
        _ => None,
    };

    RenderField {
        id: field.id.to_string(),
        label: field.label.clone(),
        kind: field.kind,
        widget: field.kind.widget(),
        // hidden fields are never required
        required: visible && field.required,
        declared_required: field.required,
        visible,
        condition: field.condition.as_ref().map(|condition| RenderCondition {
            depends_on: condition.depends_on_field_id.to_string(),
            show_when: condition.show_when_value.clone(),
        }),
        placeholder: field.placeholder.clone(),
        options,
        current_value,
        location,
        error: validation
            .and_then(|result| result.error_for(&field.id))
            .map(|error| error.message.clone()),
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert("type".into(), Value::String(field.kind.to_string()));
            map.insert(
                "widget".into(),
                serde_json::to_value(field.widget).unwrap_or(Value::Null),
            );
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            if let Some(condition) = &field.condition {
                map.insert(
                    "condition".into(),
                    json!({
                        "depends_on": condition.depends_on,
                        "show_when": condition.show_when,
                    }),
                );
            }
            if let Some(placeholder) = &field.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            if !field.options.is_empty() {
                map.insert(
                    "options".into(),
                    Value::Array(
                        field
                            .options
                            .iter()
                            .map(|option| Value::String(option.value.clone()))
                            .collect(),
                    ),
                );
            }
            if let Some(current_value) = &field.current_value {
                map.insert("current_value".into(), Value::String(current_value.clone()));
            }
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_name": payload.form_name,
        "description": payload.description,
        "public_url": payload.public_url,
        "status": payload.status,
        "media": payload.media,
        "tutorial": payload.tutorial,
        "progress": {
            "answered": payload.answered,
            "total": payload.total,
        },
        "fields": fields,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} (/form/{})", payload.form_name, payload.public_url));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status, payload.answered, payload.total
    ));
    if let Some(description) = &payload.description {
        lines.push(format!("Description: {}", description));
    }

    lines.push("Visible fields:".to_string());
    for field in payload.fields.iter().filter(|field| field.visible) {
        let mut entry = format!(" - {} [{}]", field.label, field.kind);
        if field.required {
            entry.push_str(" *");
        }
        if let Some(current_value) = &field.current_value {
            entry.push_str(&format!(" = {}", current_value));
        }
        if let Some(error) = &field.error {
            entry.push_str(&format!(" ! {}", error));
        }
        lines.push(entry);
    }

    lines.join("\n")
}

fn registry() -> Result<Handlebars<'static>, RenderError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_template_string("form_page", FORM_PAGE_TEMPLATE)?;
    handlebars.register_template_string("not_found", NOT_FOUND_TEMPLATE)?;
    handlebars.register_template_string("login", LOGIN_TEMPLATE)?;
    Ok(handlebars)
}

/// Render the public form page. Hidden conditional fields are rendered too,
/// disabled, so the page can reveal them when their controller changes.
pub fn render_html(payload: &RenderPayload) -> Result<String, RenderError> {
    let handlebars = registry()?;
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut value = serde_json::to_value(field).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert(
                    format!("is_{}", widget_name(field.widget)),
                    Value::Bool(true),
                );
            }
            value
        })
        .collect::<Vec<_>>();
    let data = json!({
        "form": payload,
        "fields": fields,
    });
    Ok(handlebars.render("form_page", &data)?)
}

/// Render the page shown for unknown or unpublished slugs.
pub fn render_not_found(slug: &str) -> Result<String, RenderError> {
    let handlebars = registry()?;
    Ok(handlebars.render("not_found", &json!({ "slug": slug }))?)
}

/// Render the admin sign-in page. `target` is the already vetted redirect path.
pub fn render_login(action: &str, target: &str, error: Option<&str>) -> Result<String, RenderError> {
    let handlebars = registry()?;
    Ok(handlebars.render(
        "login",
        &json!({ "action": action, "target": target, "error": error }),
    )?)
}

fn widget_name(widget: Widget) -> &'static str {
    match widget {
        Widget::SingleLine { .. } => "single_line",
        Widget::MultiLine { .. } => "multi_line",
        Widget::Calendar => "calendar",
        Widget::Dropdown => "dropdown",
        Widget::CheckboxGroup => "checkbox_group",
        Widget::LocationPicker => "location_picker",
    }
}
