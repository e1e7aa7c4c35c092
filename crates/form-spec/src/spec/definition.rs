use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::field::{Field, FieldCondition, FieldId};
use crate::spec::form::Form;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("static slug pattern is valid")
});

/// Problems with a form or field definition, reported before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("form name cannot be empty")]
    EmptyFormName,
    #[error("field label cannot be empty")]
    EmptyLabel,
    #[error("field '{label}' of type {kind} needs at least one option")]
    MissingOptions { label: String, kind: String },
    #[error("public url '{0}' may only contain lowercase letters, digits and dashes")]
    InvalidSlug(String),
    #[error("field '{label}' cannot depend on itself")]
    SelfDependency { label: String },
    #[error("field '{label}' depends on field {depends_on} which is not part of this form")]
    UnknownDependency { label: String, depends_on: FieldId },
    #[error("conditional fields form a cycle through '{label}'")]
    DependencyCycle { label: String },
    #[error("another field already has order {0}")]
    OrderTaken(i64),
}

/// Portable document holding a form and its fields, used for fixtures and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormDefinition {
    pub form: Form,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl FormDefinition {
    /// Fields in display order, ties broken by creation time.
    pub fn ordered_fields(&self) -> Vec<Field> {
        let mut fields = self.fields.clone();
        sort_fields(&mut fields);
        fields
    }

    /// Enabled fields in display order, as shown on the public page.
    pub fn public_fields(&self) -> Vec<Field> {
        self.ordered_fields()
            .into_iter()
            .filter(|field| field.enabled)
            .collect()
    }

    pub fn check(&self) -> Result<(), DefinitionError> {
        if self.form.name.trim().is_empty() {
            return Err(DefinitionError::EmptyFormName);
        }
        for field in &self.fields {
            check_field_shape(&field.label, field.kind, field.options.as_deref())?;
        }
        check_conditions(&self.fields)
    }
}

/// Sorts by `order`, then by creation time for stable tie-breaking.
pub fn sort_fields(fields: &mut [Field]) {
    fields.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// Trims a caller-supplied slug and checks its shape.
pub fn normalize_slug(raw: &str) -> Result<String, DefinitionError> {
    let slug = raw.trim().to_lowercase();
    if SLUG_PATTERN.is_match(&slug) {
        Ok(slug)
    } else {
        Err(DefinitionError::InvalidSlug(raw.to_string()))
    }
}

/// Drops blank options and discards options on types that ignore them.
pub fn normalize_options(
    kind: crate::field_type::FieldType,
    options: Option<Vec<String>>,
) -> Option<Vec<String>> {
    if !kind.requires_options() {
        return None;
    }
    let cleaned = options
        .unwrap_or_default()
        .into_iter()
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect::<Vec<_>>();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn check_field_shape(
    label: &str,
    kind: crate::field_type::FieldType,
    options: Option<&[String]>,
) -> Result<(), DefinitionError> {
    if label.trim().is_empty() {
        return Err(DefinitionError::EmptyLabel);
    }
    if kind.requires_options() && options.is_none_or(|options| options.is_empty()) {
        return Err(DefinitionError::MissingOptions {
            label: label.to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(())
}

/// Checks that every condition points at a sibling field and that no cycle exists.
pub fn check_conditions(fields: &[Field]) -> Result<(), DefinitionError> {
    let by_id: BTreeMap<FieldId, &Field> = fields.iter().map(|field| (field.id, field)).collect();

    for field in fields {
        let Some(FieldCondition {
            depends_on_field_id,
            ..
        }) = &field.condition
        else {
            continue;
        };
        if *depends_on_field_id == field.id {
            return Err(DefinitionError::SelfDependency {
                label: field.label.clone(),
            });
        }
        if !by_id.contains_key(depends_on_field_id) {
            return Err(DefinitionError::UnknownDependency {
                label: field.label.clone(),
                depends_on: *depends_on_field_id,
            });
        }
    }

    for field in fields {
        let mut seen = BTreeSet::from([field.id]);
        let mut cursor = field;
        while let Some(condition) = &cursor.condition {
            let Some(next) = by_id.get(&condition.depends_on_field_id) else {
                break;
            };
            if !seen.insert(next.id) {
                return Err(DefinitionError::DependencyCycle {
                    label: field.label.clone(),
                });
            }
            cursor = next;
        }
    }

    Ok(())
}
