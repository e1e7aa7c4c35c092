//! Answer sets and the typed view over their string wire format.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field_type::FieldType;
use crate::location::{GeoPoint, GeoPointError};
use crate::spec::field::FieldId;

/// Separator for multi-choice answers. Options containing it do not round-trip.
pub const CHOICE_SEPARATOR: &str = ", ";

/// In-progress answers keyed by field id, each in its stored string form.
pub type AnswerMap = BTreeMap<FieldId, String>;

/// Typed answer recovered from a stored string and the field's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(f64),
    Choice(String),
    Choices(Vec<String>),
    Date(NaiveDate),
    Location(GeoPoint),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnswerError {
    #[error("answer is empty")]
    Empty,
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("'{0}' is not a YYYY-MM-DD date")]
    NotADate(String),
    #[error(transparent)]
    Location(#[from] GeoPointError),
}

impl AnswerValue {
    /// Decodes a stored answer. Empty input is reported as [`AnswerError::Empty`].
    pub fn decode(kind: FieldType, raw: &str) -> Result<Self, AnswerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AnswerError::Empty);
        }
        match kind {
            FieldType::Text | FieldType::Textarea | FieldType::Email | FieldType::Phone => {
                Ok(AnswerValue::Text(raw.to_string()))
            }
            FieldType::Number => parse_number(trimmed)
                .map(AnswerValue::Number)
                .ok_or_else(|| AnswerError::NotANumber(trimmed.to_string())),
            FieldType::Select => Ok(AnswerValue::Choice(raw.to_string())),
            FieldType::Checkbox => Ok(AnswerValue::Choices(split_choices(raw))),
            FieldType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(AnswerValue::Date)
                .map_err(|_| AnswerError::NotADate(trimmed.to_string())),
            FieldType::Location => Ok(AnswerValue::Location(GeoPoint::parse(trimmed)?)),
        }
    }

    /// Encodes back to the stored string form.
    pub fn encode(&self) -> String {
        match self {
            AnswerValue::Text(text) | AnswerValue::Choice(text) => text.clone(),
            AnswerValue::Number(number) => number.to_string(),
            AnswerValue::Choices(choices) => join_choices(choices),
            AnswerValue::Date(date) => date.format("%Y-%m-%d").to_string(),
            AnswerValue::Location(point) => point.to_answer(),
        }
    }

    /// Human-readable rendering used in listings and exports.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Location(point) => match &point.address {
                Some(address) => format!("{} ({:.6}, {:.6})", address, point.lat, point.lng),
                None => format!("{:.6}, {:.6}", point.lat, point.lng),
            },
            other => other.encode(),
        }
    }
}

/// Accepts finite decimal numbers, optionally surrounded by whitespace.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

pub fn join_choices<S: AsRef<str>>(choices: &[S]) -> String {
    choices
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(CHOICE_SEPARATOR)
}

pub fn split_choices(raw: &str) -> Vec<String> {
    raw.split(CHOICE_SEPARATOR)
        .filter(|choice| !choice.is_empty())
        .map(str::to_string)
        .collect()
}

/// Toggles one option of a checkbox answer, keeping the selection order.
pub fn toggle_choice(raw: &str, option: &str, checked: bool) -> String {
    let mut current = split_choices(raw);
    current.retain(|choice| choice != option);
    if checked {
        current.push(option.to_string());
    }
    join_choices(&current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_choices_keeps_order() {
        let raw = toggle_choice("", "A", true);
        let raw = toggle_choice(&raw, "B", true);
        assert_eq!(raw, "A, B");
        assert_eq!(toggle_choice(&raw, "A", false), "B");
    }

    #[test]
    fn number_parsing_rejects_non_finite() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12a"), None);
    }

    #[test]
    fn decode_recovers_tag_from_field_type() {
        assert_eq!(
            AnswerValue::decode(FieldType::Number, "42"),
            Ok(AnswerValue::Number(42.0))
        );
        assert_eq!(
            AnswerValue::decode(FieldType::Checkbox, "A, B"),
            Ok(AnswerValue::Choices(vec!["A".into(), "B".into()]))
        );
        assert!(matches!(
            AnswerValue::decode(FieldType::Date, "2024-02-30"),
            Err(AnswerError::NotADate(_))
        ));
        assert_eq!(
            AnswerValue::decode(FieldType::Text, "   "),
            Err(AnswerError::Empty)
        );
    }
}
