use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::field_type::FieldType;
use crate::spec::form::FormId;

pub type FieldId = Uuid;

/// Shows the owning field only while another field holds a given answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldCondition {
    pub depends_on_field_id: FieldId,
    /// Compared with exact string equality against the controller's answer.
    pub show_when_value: String,
}

/// One typed question within a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub id: FieldId,
    pub form_id: FormId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub order: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<FieldCondition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Field {
    /// Choice list for select/checkbox fields; empty for every other type.
    pub fn choices(&self) -> &[String] {
        if self.kind.requires_options() {
            self.options.as_deref().unwrap_or_default()
        } else {
            &[]
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

/// Input for adding a field. A missing `order` appends after the last field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewField {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub condition: Option<FieldCondition>,
}

impl NewField {
    pub fn new(label: impl Into<String>, kind: FieldType) -> Self {
        Self {
            label: label.into(),
            kind,
            required: false,
            placeholder: None,
            options: None,
            order: None,
            enabled: true,
            condition: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn shown_when(mut self, depends_on_field_id: FieldId, value: impl Into<String>) -> Self {
        self.condition = Some(FieldCondition {
            depends_on_field_id,
            show_when_value: value.into(),
        });
        self
    }
}

/// Editable field attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldUpdate {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub enabled: bool,
    #[serde(default)]
    pub condition: Option<FieldCondition>,
}

impl FieldUpdate {
    pub fn from_field(field: &Field) -> Self {
        Self {
            label: field.label.clone(),
            kind: field.kind,
            required: field.required,
            placeholder: field.placeholder.clone(),
            options: field.options.clone(),
            enabled: field.enabled,
            condition: field.condition.clone(),
        }
    }
}
