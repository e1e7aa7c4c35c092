use chrono::Utc;
use form_spec::{
    AnswerMap, AnswerValue, Field, FieldCondition, FieldId, FieldType, FormSession,
    VisibilityMode, join_choices, resolve_visibility, split_choices, visible_ids,
};
use uuid::Uuid;

fn field(label: &str, kind: FieldType, order: i64) -> Field {
    let now = Utc::now();
    Field {
        id: Uuid::new_v4(),
        form_id: Uuid::nil(),
        label: label.into(),
        kind,
        required: true,
        placeholder: None,
        options: kind
            .requires_options()
            .then(|| vec!["نعم".to_string(), "لا".to_string()]),
        order,
        enabled: true,
        condition: None,
        created_at: now,
        updated_at: now,
    }
}

fn depends_on(mut dependent: Field, controller: &Field, trigger: &str) -> Field {
    dependent.condition = Some(FieldCondition {
        depends_on_field_id: controller.id,
        show_when_value: trigger.into(),
    });
    dependent
}

#[test]
fn controller_answer_toggles_dependent_and_clears_it() {
    let f1 = field("F1", FieldType::Select, 1);
    let f2 = depends_on(field("F2", FieldType::Text, 2), &f1, "نعم");
    let mut session = FormSession::new(vec![f1.clone(), f2.clone()], VisibilityMode::Hidden);

    assert!(!session.is_visible(&f2.id));
    session.set_answer(f1.id, "نعم");
    assert!(session.is_visible(&f2.id));
    session.set_answer(f2.id, "kept for now");

    let cleared = session.set_answer(f1.id, "لا");
    assert!(!session.is_visible(&f2.id));
    assert_eq!(cleared, vec![f2.id]);
    assert!(!session.answers().contains_key(&f2.id));

    session.set_answer(f1.id, "نعم");
    assert!(session.is_visible(&f2.id));
    assert!(!session.answers().contains_key(&f2.id));
}

#[test]
fn chains_cascade_clears_through_every_level() {
    let a = field("A", FieldType::Select, 1);
    let b = depends_on(field("B", FieldType::Select, 2), &a, "نعم");
    let c = depends_on(field("C", FieldType::Text, 3), &b, "نعم");
    // declared out of order on purpose
    let mut session =
        FormSession::new(vec![c.clone(), b.clone(), a.clone()], VisibilityMode::Hidden);

    session.set_answer(a.id, "نعم");
    session.set_answer(b.id, "نعم");
    session.set_answer(c.id, "deep");
    assert_eq!(session.visible_fields().count(), 3);

    let mut cleared = session.set_answer(a.id, "لا");
    cleared.sort();
    let mut expected = vec![b.id, c.id];
    expected.sort();
    assert_eq!(cleared, expected);
    assert_eq!(session.answers().len(), 1);
}

#[test]
fn visibility_is_idempotent() {
    let f1 = field("F1", FieldType::Select, 1);
    let f2 = depends_on(field("F2", FieldType::Text, 2), &f1, "نعم");
    let fields = vec![f1.clone(), f2];
    let answers = AnswerMap::from([(f1.id, "نعم".to_string())]);

    let first = resolve_visibility(&fields, &answers, VisibilityMode::Hidden);
    let second = resolve_visibility(&fields, &answers, VisibilityMode::Hidden);
    assert_eq!(visible_ids(&first), visible_ids(&second));
    assert_eq!(first, second);
}

#[test]
fn trigger_comparison_is_exact() {
    let f1 = field("F1", FieldType::Text, 1);
    let f2 = depends_on(field("F2", FieldType::Text, 2), &f1, "Yes");
    let fields = vec![f1.clone(), f2.clone()];

    for near_miss in ["yes", "Yes ", " Yes"] {
        let answers = AnswerMap::from([(f1.id, near_miss.to_string())]);
        let map = resolve_visibility(&fields, &answers, VisibilityMode::Hidden);
        assert_eq!(map.get(&f2.id), Some(&false), "{near_miss:?}");
    }
}

#[test]
fn missing_controller_follows_mode() {
    let orphan = depends_on(
        field("Orphan", FieldType::Text, 1),
        &field("Gone", FieldType::Text, 0),
        "x",
    );
    let fields = vec![orphan.clone()];
    let hidden = resolve_visibility(&fields, &AnswerMap::new(), VisibilityMode::Hidden);
    let visible = resolve_visibility(&fields, &AnswerMap::new(), VisibilityMode::Visible);
    assert_eq!(hidden.get(&orphan.id), Some(&false));
    assert_eq!(visible.get(&orphan.id), Some(&true));
}

#[test]
fn disabled_controller_hides_dependents() {
    let mut f1 = field("F1", FieldType::Select, 1);
    f1.enabled = false;
    let f2 = depends_on(field("F2", FieldType::Text, 2), &f1, "نعم");
    let answers = AnswerMap::from([(f1.id, "نعم".to_string())]);
    let map = resolve_visibility(&[f1, f2.clone()], &answers, VisibilityMode::Visible);
    assert_eq!(map.get(&f2.id), Some(&false));
}

#[test]
fn checkbox_answers_round_trip() {
    let raw = join_choices(&["A", "B"]);
    assert_eq!(raw, "A, B");
    assert_eq!(split_choices(&raw), vec!["A".to_string(), "B".to_string()]);
    assert_eq!(
        AnswerValue::decode(FieldType::Checkbox, &raw),
        Ok(AnswerValue::Choices(vec!["A".into(), "B".into()]))
    );
}

#[test]
fn option_containing_separator_does_not_round_trip() {
    let options = ["Tunis, Ariana", "Sfax"];
    let raw = join_choices(&options);
    let parsed = split_choices(&raw);
    assert_eq!(parsed, vec!["Tunis", "Ariana", "Sfax"]);
    assert_ne!(parsed.len(), options.len());
}

#[test]
fn restoring_a_session_prunes_stale_answers() {
    let f1 = field("F1", FieldType::Select, 1);
    let f2 = depends_on(field("F2", FieldType::Text, 2), &f1, "نعم");
    let answers: AnswerMap = [
        (f1.id, "لا".to_string()),
        (f2.id, "stale".to_string()),
    ]
    .into();
    let session = FormSession::with_answers(vec![f1, f2.clone()], answers, VisibilityMode::Hidden);
    let ids: Vec<FieldId> = session.answers().keys().copied().collect();
    assert!(!ids.contains(&f2.id));
}
