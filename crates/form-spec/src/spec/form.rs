use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type FormId = Uuid;

/// Publication state of a form. Only `Active` forms are reachable publicly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Draft,
    Active,
    Disabled,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Active => "active",
            FormStatus::Disabled => "disabled",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, FormStatus::Active)
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "draft" => Ok(FormStatus::Draft),
            "active" => Ok(FormStatus::Active),
            "disabled" => Ok(FormStatus::Disabled),
            other => Err(format!("unknown form status '{}'", other)),
        }
    }
}

/// Kind of header media shown above the public form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    None,
    Image,
    Video,
    Logo,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::None => "none",
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Logo => "logo",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "none" => Ok(MediaType::None),
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "logo" => Ok(MediaType::Logo),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

/// A stored form row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Form {
    pub id: FormId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: FormStatus,
    /// Public slug, unique across all forms.
    pub public_url: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial_video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a form. A missing `public_url` gets a random token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct NewForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub tutorial_video_url: Option<String>,
}

/// Editable form attributes. The slug is not editable once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: FormStatus,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub tutorial_video_url: Option<String>,
}

impl FormUpdate {
    /// Starts an update from the current state of `form`.
    pub fn from_form(form: &Form) -> Self {
        Self {
            name: form.name.clone(),
            description: form.description.clone(),
            status: form.status,
            media_type: form.media_type,
            media_url: form.media_url.clone(),
            tutorial_video_url: form.tutorial_video_url.clone(),
        }
    }
}
