use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerMap, parse_number, split_choices};
use crate::field_type::FormatRule;
use crate::location::GeoPoint;
use crate::spec::field::{Field, FieldId};
use crate::visibility::{VisibilityMap, VisibilityMode, resolve_visibility};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9\s+()\-]+$").expect("static phone pattern"));

/// Why a single field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RequiredMissing,
    InvalidEmail,
    InvalidNumber,
    InvalidPhone,
    InvalidDate,
    InvalidOption,
    InvalidLocation,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::RequiredMissing => "required_missing",
            ErrorKind::InvalidEmail => "invalid_email",
            ErrorKind::InvalidNumber => "invalid_number",
            ErrorKind::InvalidPhone => "invalid_phone",
            ErrorKind::InvalidDate => "invalid_date",
            ErrorKind::InvalidOption => "invalid_option",
            ErrorKind::InvalidLocation => "invalid_location",
        }
    }

    pub fn message(&self, label: &str) -> String {
        match self {
            ErrorKind::RequiredMissing => format!("{} is required", label),
            ErrorKind::InvalidEmail => "Please enter a valid email address".into(),
            ErrorKind::InvalidNumber => "Please enter a valid number".into(),
            ErrorKind::InvalidPhone => "Please enter a valid phone number".into(),
            ErrorKind::InvalidDate => "Please enter a valid date".into(),
            ErrorKind::InvalidOption => "Please choose one of the listed options".into(),
            ErrorKind::InvalidLocation => "Please pick a location on the map".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_id: FieldId,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Answers whose field id is not among the checked fields. Informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<FieldId>,
}

impl ValidationResult {
    pub fn error_for(&self, field_id: &FieldId) -> Option<&ValidationError> {
        self.errors.iter().find(|error| &error.field_id == field_id)
    }

    pub fn kinds(&self) -> Vec<(FieldId, ErrorKind)> {
        self.errors
            .iter()
            .map(|error| (error.field_id, error.kind))
            .collect()
    }
}

/// Validates `answers` against the visible subset of `fields`.
///
/// Every invalid visible field yields exactly one error; hidden and disabled
/// fields are skipped regardless of their `required` flag.
pub fn validate(
    fields: &[Field],
    visible: &BTreeSet<FieldId>,
    answers: &AnswerMap,
) -> ValidationResult {
    let mut errors = Vec::new();

    for field in fields {
        if !field.enabled || !visible.contains(&field.id) {
            continue;
        }
        let value = answers.get(&field.id).map(String::as_str).unwrap_or("");
        if let Some(kind) = check_field(field, value) {
            errors.push(ValidationError {
                field_id: field.id,
                kind,
                message: kind.message(&field.label),
            });
        }
    }

    let known: BTreeSet<FieldId> = fields.iter().map(|field| field.id).collect();
    let unknown_fields = answers
        .keys()
        .filter(|id| !known.contains(*id))
        .copied()
        .collect();

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        unknown_fields,
    }
}

/// Resolves visibility from the answers, then validates.
pub fn validate_answers(fields: &[Field], answers: &AnswerMap) -> (VisibilityMap, ValidationResult) {
    let visibility = resolve_visibility(fields, answers, VisibilityMode::Hidden);
    let visible = crate::visibility::visible_ids(&visibility);
    let result = validate(fields, &visible, answers);
    (visibility, result)
}

/// Checks a single answer; `None` means the value is acceptable.
pub fn check_field(field: &Field, value: &str) -> Option<ErrorKind> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return field.required.then_some(ErrorKind::RequiredMissing);
    }

    match field.kind.format_rule() {
        FormatRule::Free => None,
        FormatRule::Email => (!EMAIL_PATTERN.is_match(trimmed)).then_some(ErrorKind::InvalidEmail),
        FormatRule::Number => parse_number(trimmed)
            .is_none()
            .then_some(ErrorKind::InvalidNumber),
        FormatRule::Phone => (!PHONE_PATTERN.is_match(trimmed)).then_some(ErrorKind::InvalidPhone),
        FormatRule::IsoDate => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .is_err()
            .then_some(ErrorKind::InvalidDate),
        FormatRule::OneOption => (!field.choices().iter().any(|option| option == trimmed))
            .then_some(ErrorKind::InvalidOption),
        FormatRule::SomeOptions => {
            let options = field.choices();
            split_choices(trimmed)
                .iter()
                .any(|choice| !options.contains(choice))
                .then_some(ErrorKind::InvalidOption)
        }
        FormatRule::GeoPoint => GeoPoint::parse(trimmed)
            .is_err()
            .then_some(ErrorKind::InvalidLocation),
    }
}
