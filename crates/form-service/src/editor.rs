//! Admin editing of forms and fields, including swap-based reordering and
//! template instantiation.

use std::sync::Arc;

use chrono::Utc;
use form_spec::spec::{check_conditions, check_field_shape, normalize_options, normalize_slug};
use form_spec::{
    DefinitionError, Field, FieldId, FieldUpdate, Form, FormDefinition, FormId, FormUpdate,
    NewField, NewForm, find_template,
};
use form_store::{FormStore, StoreError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Confirmation, ServiceError, ServiceResult, backend};

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SLUG_LEN: usize = 26;
const SLUG_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Clone)]
pub struct FormEditor {
    store: Arc<dyn FormStore>,
}

impl FormEditor {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    pub async fn list_forms(&self) -> ServiceResult<Vec<Form>> {
        self.store
            .list_forms()
            .await
            .map_err(backend("list_forms"))
    }

    /// Creates a form. Without a caller slug a random token is generated,
    /// retrying when it collides with an existing one.
    #[instrument(name = "editor.create_form", skip_all)]
    pub async fn create_form(&self, new: NewForm) -> ServiceResult<Form> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(DefinitionError::EmptyFormName.into());
        }
        let requested = new
            .public_url
            .as_deref()
            .filter(|slug| !slug.trim().is_empty())
            .map(normalize_slug)
            .transpose()?;

        let attempts = if requested.is_some() { 1 } else { SLUG_ATTEMPTS };
        let mut last_err = None;
        for _ in 0..attempts {
            let now = Utc::now();
            let form = Form {
                id: Uuid::new_v4(),
                name: name.clone(),
                description: clean(new.description.clone()),
                status: new.status,
                public_url: requested.clone().unwrap_or_else(random_slug),
                media_type: new.media_type,
                media_url: clean(new.media_url.clone()),
                tutorial_video_url: clean(new.tutorial_video_url.clone()),
                created_at: now,
                updated_at: now,
            };
            match self.store.insert_form(form).await {
                Ok(form) => {
                    info!(form_id = %form.id, slug = %form.public_url, "form created");
                    return Ok(form);
                }
                Err(err @ StoreError::Duplicate { .. }) => last_err = Some(err),
                Err(err) => return Err(backend("insert_form")(err)),
            }
        }
        match last_err {
            Some(err) => Err(ServiceError::Conflict(err.to_string())),
            None => Err(ServiceError::Conflict("public url is already taken".into())),
        }
    }

    #[instrument(name = "editor.update_form", skip_all, fields(form_id = %id))]
    pub async fn update_form(&self, id: FormId, mut update: FormUpdate) -> ServiceResult<Form> {
        update.name = update.name.trim().to_string();
        if update.name.is_empty() {
            return Err(DefinitionError::EmptyFormName.into());
        }
        update.description = clean(update.description);
        update.media_url = clean(update.media_url);
        update.tutorial_video_url = clean(update.tutorial_video_url);
        self.store
            .update_form(id, update, Utc::now())
            .await
            .map_err(backend("update_form"))
    }

    /// Deletes the form with all of its fields and submissions.
    #[instrument(name = "editor.delete_form", skip_all, fields(form_id = %id))]
    pub async fn delete_form(&self, id: FormId, confirmation: Confirmation) -> ServiceResult<()> {
        confirmation.require("deleting a form")?;
        self.store
            .delete_form(id)
            .await
            .map_err(backend("delete_form"))?;
        info!("form deleted");
        Ok(())
    }

    pub async fn form_definition(&self, id: FormId) -> ServiceResult<FormDefinition> {
        let form = self.store.form(id).await.map_err(backend("form"))?;
        let fields = self.fields(id).await?;
        Ok(FormDefinition { form, fields })
    }

    /// All fields of the form in display order, disabled ones included.
    pub async fn fields(&self, form_id: FormId) -> ServiceResult<Vec<Field>> {
        self.store
            .list_fields(form_id, false)
            .await
            .map_err(backend("list_fields"))
    }

    #[instrument(name = "editor.add_field", skip_all, fields(form_id = %form_id))]
    pub async fn add_field(&self, form_id: FormId, new: NewField) -> ServiceResult<Field> {
        self.store.form(form_id).await.map_err(backend("form"))?;
        let label = new.label.trim().to_string();
        let options = normalize_options(new.kind, new.options);
        check_field_shape(&label, new.kind, options.as_deref())?;

        let mut siblings = self.fields(form_id).await?;
        let order = match new.order {
            Some(order) if siblings.iter().any(|field| field.order == order) => {
                return Err(DefinitionError::OrderTaken(order).into());
            }
            Some(order) => order,
            None => siblings.iter().map(|field| field.order).max().unwrap_or(0) + 1,
        };
        let now = Utc::now();
        let field = Field {
            id: Uuid::new_v4(),
            form_id,
            label,
            kind: new.kind,
            required: new.required,
            placeholder: clean(new.placeholder),
            options,
            order,
            enabled: new.enabled,
            condition: new.condition,
            created_at: now,
            updated_at: now,
        };
        siblings.push(field.clone());
        check_conditions(&siblings)?;

        let mut stored = self
            .store
            .insert_fields(vec![field])
            .await
            .map_err(backend("insert_fields"))?;
        let field = stored
            .pop()
            .ok_or_else(|| ServiceError::Conflict("field was not stored".into()))?;
        info!(field_id = %field.id, "field added");
        Ok(field)
    }

    #[instrument(name = "editor.update_field", skip_all, fields(field_id = %id))]
    pub async fn update_field(&self, id: FieldId, mut update: FieldUpdate) -> ServiceResult<Field> {
        let current = self.store.field(id).await.map_err(backend("field"))?;
        update.label = update.label.trim().to_string();
        update.options = normalize_options(update.kind, update.options);
        update.placeholder = clean(update.placeholder);
        check_field_shape(&update.label, update.kind, update.options.as_deref())?;

        let siblings = self
            .fields(current.form_id)
            .await?
            .into_iter()
            .map(|field| {
                if field.id == id {
                    Field {
                        condition: update.condition.clone(),
                        ..field
                    }
                } else {
                    field
                }
            })
            .collect::<Vec<_>>();
        check_conditions(&siblings)?;

        self.store
            .update_field(id, update, Utc::now())
            .await
            .map_err(backend("update_field"))
    }

    /// Deletes a field. Conditions of fields that depended on it are dropped;
    /// stored answers are kept.
    #[instrument(name = "editor.delete_field", skip_all, fields(field_id = %id))]
    pub async fn delete_field(&self, id: FieldId, confirmation: Confirmation) -> ServiceResult<()> {
        confirmation.require("deleting a field")?;
        self.store
            .delete_field(id)
            .await
            .map_err(backend("delete_field"))?;
        info!("field deleted");
        Ok(())
    }

    /// Swaps the field with its neighbour in display order and returns the
    /// reloaded field list. Moving past either end is a no-op.
    #[instrument(name = "editor.move_field", skip_all, fields(field_id = %id, ?direction))]
    pub async fn move_field(&self, id: FieldId, direction: MoveDirection) -> ServiceResult<Vec<Field>> {
        let field = self.store.field(id).await.map_err(backend("field"))?;
        let mut fields = self.fields(field.form_id).await?;

        let Some((current, neighbour)) = neighbours(&fields, id, direction) else {
            return Ok(fields);
        };
        if current.order == neighbour.order {
            fields = self.normalize_order(field.form_id).await?;
        }
        let Some((current, neighbour)) = neighbours(&fields, id, direction) else {
            return Ok(fields);
        };
        let (current, neighbour) = (current.clone(), neighbour.clone());

        let now = Utc::now();
        self.store
            .set_field_order(current.id, neighbour.order, now)
            .await
            .map_err(backend("set_field_order"))?;

        if let Err(err) = self
            .store
            .set_field_order(neighbour.id, current.order, now)
            .await
        {
            warn!(neighbour_id = %neighbour.id, error = %err, "second reorder write failed, restoring");
            return match self
                .store
                .set_field_order(current.id, current.order, Utc::now())
                .await
            {
                Ok(_) => Err(backend("set_field_order")(err)),
                Err(restore) => {
                    warn!(error = %restore, "could not restore field order");
                    Err(ServiceError::PartialWrite {
                        completed: format!("field '{}' was moved", current.label),
                        failed: format!(
                            "field '{}' could not be moved and now shares its position",
                            neighbour.label
                        ),
                    })
                }
            };
        }

        self.fields(field.form_id).await
    }

    /// Renumbers the fields of a form as 1..n in display order, writing only
    /// the fields whose order changes.
    #[instrument(name = "editor.normalize_order", skip_all, fields(form_id = %form_id))]
    pub async fn normalize_order(&self, form_id: FormId) -> ServiceResult<Vec<Field>> {
        let fields = self.fields(form_id).await?;
        let now = Utc::now();
        for (position, field) in fields.iter().enumerate() {
            let order = position as i64 + 1;
            if field.order != order {
                self.store
                    .set_field_order(field.id, order, now)
                    .await
                    .map_err(backend("set_field_order"))?;
            }
        }
        self.fields(form_id).await
    }

    /// Creates a form and its fields from a built-in template. When the fields
    /// cannot be stored the form is deleted again.
    #[instrument(name = "editor.instantiate_template", skip_all, fields(template = key))]
    pub async fn instantiate_template(&self, key: &str) -> ServiceResult<FormDefinition> {
        let template =
            find_template(key).ok_or_else(|| ServiceError::not_found("template", key))?;
        let form = self.create_form(template.new_form()).await?;
        let fields = template.build_fields(form.id, Utc::now());

        match self.store.insert_fields(fields).await {
            Ok(fields) => {
                info!(form_id = %form.id, fields = fields.len(), "template instantiated");
                Ok(FormDefinition { form, fields })
            }
            Err(err) => {
                warn!(form_id = %form.id, error = %err, "template fields failed, removing form");
                match self.store.delete_form(form.id).await {
                    Ok(()) => Err(backend("insert_fields")(err)),
                    Err(cleanup) => {
                        warn!(form_id = %form.id, error = %cleanup, "could not remove form");
                        Err(ServiceError::PartialWrite {
                            completed: format!("form '{}' was saved", form.name),
                            failed: "its fields could not be saved".to_string(),
                        })
                    }
                }
            }
        }
    }
}

fn neighbours(
    fields: &[Field],
    id: FieldId,
    direction: MoveDirection,
) -> Option<(&Field, &Field)> {
    let position = fields.iter().position(|field| field.id == id)?;
    let other = match direction {
        MoveDirection::Up => position.checked_sub(1)?,
        MoveDirection::Down => position + 1,
    };
    Some((&fields[position], fields.get(other)?))
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Random lowercase alphanumeric public url.
pub fn random_slug() -> String {
    let mut rng = rand::thread_rng();
    (0..SLUG_LEN)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}
