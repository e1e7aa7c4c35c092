//! Field type registry: maps a declared field type to its input widget and
//! default format rule.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Email,
    Phone,
    Textarea,
    Select,
    Checkbox,
    Date,
    Location,
}

/// Input control used to capture a field's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    /// Single-line input; `input_type` is the HTML input type.
    SingleLine { input_type: &'static str },
    MultiLine { rows: u8 },
    Calendar,
    Dropdown,
    CheckboxGroup,
    LocationPicker,
}

/// Format check applied to a non-empty answer, on top of required-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    Free,
    Email,
    Number,
    Phone,
    IsoDate,
    OneOption,
    SomeOptions,
    GeoPoint,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Date,
        FieldType::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Location => "location",
        }
    }

    /// Choice types carry a non-empty option list; every other type ignores it.
    pub fn requires_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Checkbox)
    }

    pub fn widget(&self) -> Widget {
        match self {
            FieldType::Text => Widget::SingleLine { input_type: "text" },
            FieldType::Email => Widget::SingleLine {
                input_type: "email",
            },
            FieldType::Phone => Widget::SingleLine { input_type: "tel" },
            FieldType::Number => Widget::SingleLine {
                input_type: "number",
            },
            FieldType::Textarea => Widget::MultiLine { rows: 4 },
            FieldType::Date => Widget::Calendar,
            FieldType::Select => Widget::Dropdown,
            FieldType::Checkbox => Widget::CheckboxGroup,
            FieldType::Location => Widget::LocationPicker,
        }
    }

    pub fn format_rule(&self) -> FormatRule {
        match self {
            FieldType::Text | FieldType::Textarea => FormatRule::Free,
            FieldType::Email => FormatRule::Email,
            FieldType::Number => FormatRule::Number,
            FieldType::Phone => FormatRule::Phone,
            FieldType::Date => FormatRule::IsoDate,
            FieldType::Select => FormatRule::OneOption,
            FieldType::Checkbox => FormatRule::SomeOptions,
            FieldType::Location => FormatRule::GeoPoint,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| format!("unknown field type '{}'", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_choice_types_require_options() {
        let with_options = FieldType::ALL
            .into_iter()
            .filter(FieldType::requires_options)
            .collect::<Vec<_>>();
        assert_eq!(with_options, vec![FieldType::Select, FieldType::Checkbox]);
    }

    #[test]
    fn type_names_round_trip_through_from_str() {
        for kind in FieldType::ALL {
            assert_eq!(kind.as_str().parse::<FieldType>(), Ok(kind));
        }
        assert!("radio".parse::<FieldType>().is_err());
    }

    #[test]
    fn number_renders_as_numeric_single_line() {
        assert_eq!(
            FieldType::Number.widget(),
            Widget::SingleLine {
                input_type: "number"
            }
        );
        assert_eq!(FieldType::Location.widget(), Widget::LocationPicker);
    }
}
