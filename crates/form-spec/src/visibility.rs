use std::collections::{BTreeMap, BTreeSet};

use crate::answers::AnswerMap;
use crate::spec::field::{Field, FieldId};

pub type VisibilityMap = BTreeMap<FieldId, bool>;

/// How to treat a condition that cannot be resolved (missing controller or a cycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityMode {
    Visible,
    #[default]
    Hidden,
}

/// Computes which fields are shown for the current answers.
///
/// A field is visible when it is enabled and, if conditional, its controller is
/// itself visible and currently answered with exactly the trigger value.
/// Chains are resolved depth-first so the result does not depend on field order.
pub fn resolve_visibility(fields: &[Field], answers: &AnswerMap, mode: VisibilityMode) -> VisibilityMap {
    let by_id: BTreeMap<FieldId, &Field> = fields.iter().map(|field| (field.id, field)).collect();
    let mut map = VisibilityMap::new();
    let mut in_progress = BTreeSet::new();

    for field in fields {
        resolve_one(field, &by_id, answers, mode, &mut map, &mut in_progress);
    }

    map
}

fn resolve_one(
    field: &Field,
    by_id: &BTreeMap<FieldId, &Field>,
    answers: &AnswerMap,
    mode: VisibilityMode,
    map: &mut VisibilityMap,
    in_progress: &mut BTreeSet<FieldId>,
) -> bool {
    if let Some(visible) = map.get(&field.id) {
        return *visible;
    }
    if !in_progress.insert(field.id) {
        // cycle
        return unresolved(mode);
    }

    let visible = if !field.enabled {
        false
    } else if let Some(condition) = &field.condition {
        match by_id.get(&condition.depends_on_field_id) {
            Some(controller) => {
                resolve_one(controller, by_id, answers, mode, map, in_progress)
                    && answers.get(&controller.id).map(String::as_str)
                        == Some(condition.show_when_value.as_str())
            }
            None => unresolved(mode),
        }
    } else {
        true
    };

    in_progress.remove(&field.id);
    map.insert(field.id, visible);
    visible
}

fn unresolved(mode: VisibilityMode) -> bool {
    match mode {
        VisibilityMode::Visible => true,
        VisibilityMode::Hidden => false,
    }
}

pub fn visible_ids(map: &VisibilityMap) -> BTreeSet<FieldId> {
    map.iter()
        .filter(|(_, visible)| **visible)
        .map(|(id, _)| *id)
        .collect()
}

/// Removes answers for fields that are not visible. Returns the cleared ids.
pub fn prune_hidden(answers: &mut AnswerMap, visibility: &VisibilityMap) -> Vec<FieldId> {
    let hidden = answers
        .keys()
        .filter(|id| !visibility.get(*id).copied().unwrap_or(false))
        .copied()
        .collect::<Vec<_>>();
    for id in &hidden {
        answers.remove(id);
    }
    hidden
}

/// In-progress fill-out of one form: answers plus the derived visible set.
#[derive(Debug, Clone)]
pub struct FormSession {
    fields: Vec<Field>,
    answers: AnswerMap,
    visibility: VisibilityMap,
    mode: VisibilityMode,
}

impl FormSession {
    pub fn new(fields: Vec<Field>, mode: VisibilityMode) -> Self {
        let answers = AnswerMap::new();
        let visibility = resolve_visibility(&fields, &answers, mode);
        Self {
            fields,
            answers,
            visibility,
            mode,
        }
    }

    /// Restores a session from previously collected answers, clearing hidden ones.
    pub fn with_answers(fields: Vec<Field>, answers: AnswerMap, mode: VisibilityMode) -> Self {
        let mut session = Self::new(fields, mode);
        session.answers = answers;
        session.refresh();
        session
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    pub fn is_visible(&self, field_id: &FieldId) -> bool {
        self.visibility.get(field_id).copied().unwrap_or(false)
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| self.is_visible(&field.id))
    }

    /// Sets one answer and clears answers of every field that became hidden.
    /// An empty value removes the answer. Returns the ids that were cleared.
    pub fn set_answer(&mut self, field_id: FieldId, value: impl Into<String>) -> Vec<FieldId> {
        let value = value.into();
        if value.is_empty() {
            self.answers.remove(&field_id);
        } else {
            self.answers.insert(field_id, value);
        }
        self.refresh()
    }

    pub fn clear_answer(&mut self, field_id: &FieldId) -> Vec<FieldId> {
        self.answers.remove(field_id);
        self.refresh()
    }

    /// Answers that would be submitted: visible and non-empty only.
    pub fn submission_values(&self) -> AnswerMap {
        self.answers
            .iter()
            .filter(|(id, value)| self.is_visible(id) && !value.trim().is_empty())
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }

    pub fn into_answers(self) -> AnswerMap {
        self.answers
    }

    // Hiding a field can hide its own dependents, so repeat until stable.
    fn refresh(&mut self) -> Vec<FieldId> {
        let mut cleared = Vec::new();
        loop {
            self.visibility = resolve_visibility(&self.fields, &self.answers, self.mode);
            let pruned = prune_hidden(&mut self.answers, &self.visibility);
            if pruned.is_empty() {
                break;
            }
            cleared.extend(pruned);
        }
        cleared
    }
}
