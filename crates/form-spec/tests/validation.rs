use std::collections::BTreeSet;

use form_spec::{
    AnswerMap, ErrorKind, FieldId, FormDefinition, FormSession, VisibilityMode, validate,
    validate_answers,
};
use uuid::Uuid;

fn fixture() -> FormDefinition {
    serde_json::from_str(include_str!("fixtures/survey_form.json")).expect("deserialize")
}

fn id(n: u8) -> FieldId {
    Uuid::parse_str(&format!("22222222-2222-4222-8222-{:012}", n)).expect("uuid")
}

fn complete_answers() -> AnswerMap {
    AnswerMap::from([
        (id(1), "Amira".to_string()),
        (id(2), "amira@example.com".to_string()),
        (id(3), "لا".to_string()),
        (id(5), r#"{"lat":36.8,"lng":10.2}"#.to_string()),
    ])
}

#[test]
fn complete_answers_are_valid() {
    let definition = fixture();
    let (_, result) = validate_answers(&definition.public_fields(), &complete_answers());
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.errors.is_empty());
}

#[test]
fn invalid_email_blocks_submission() {
    let definition = fixture();
    let mut answers = complete_answers();
    answers.insert(id(2), "not-an-email".into());

    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert!(!result.valid);
    assert_eq!(result.kinds(), vec![(id(2), ErrorKind::InvalidEmail)]);
    assert_eq!(
        result.error_for(&id(2)).map(|error| error.message.as_str()),
        Some("Please enter a valid email address")
    );
}

#[test]
fn every_invalid_field_is_reported_at_once() {
    let definition = fixture();
    let answers = AnswerMap::from([
        (id(2), "a@b".to_string()),
        (id(3), "نعم".to_string()),
        (id(4), "twelve".to_string()),
        (id(6), "Apartment, Castle".to_string()),
        (id(7), "+216 (71) 123-456 ext".to_string()),
    ]);

    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert_eq!(
        result.kinds(),
        vec![
            (id(1), ErrorKind::RequiredMissing),
            (id(2), ErrorKind::InvalidEmail),
            (id(4), ErrorKind::InvalidNumber),
            (id(5), ErrorKind::RequiredMissing),
            (id(6), ErrorKind::InvalidOption),
            (id(7), ErrorKind::InvalidPhone),
        ]
    );
}

#[test]
fn hidden_and_disabled_fields_are_never_required() {
    let definition = fixture();
    let fields = definition.ordered_fields();
    let mut answers = complete_answers();
    // the rent question is hidden because the controller says "no"
    answers.insert(id(4), "not a number".into());

    let (visibility, result) = validate_answers(&fields, &answers);
    assert_eq!(visibility.get(&id(4)), Some(&false));
    assert_eq!(visibility.get(&id(8)), Some(&false));
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn validation_only_checks_the_given_visible_set() {
    let definition = fixture();
    let visible: BTreeSet<FieldId> = [id(2)].into();
    let result = validate(&definition.ordered_fields(), &visible, &AnswerMap::new());
    assert_eq!(result.kinds(), vec![(id(2), ErrorKind::RequiredMissing)]);
}

#[test]
fn whitespace_only_required_answer_is_missing() {
    let definition = fixture();
    let mut answers = complete_answers();
    answers.insert(id(1), "   ".into());
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert_eq!(result.kinds(), vec![(id(1), ErrorKind::RequiredMissing)]);
}

#[test]
fn select_answer_is_matched_after_trimming() {
    let definition = fixture();
    let mut answers = complete_answers();
    answers.insert(id(3), " لا ".into());
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert!(result.valid, "{:?}", result.errors);

    answers.insert(id(3), " ربما ".into());
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert_eq!(result.kinds(), vec![(id(3), ErrorKind::InvalidOption)]);
}

#[test]
fn optional_fields_skip_format_checks_when_empty() {
    let definition = fixture();
    let mut answers = complete_answers();
    answers.insert(id(7), String::new());
    answers.insert(id(6), String::new());
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert!(result.valid);
}

#[test]
fn map_pick_without_address_satisfies_required_location() {
    let definition = fixture();
    let answers = complete_answers();
    assert_eq!(answers[&id(5)], r#"{"lat":36.8,"lng":10.2}"#);
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert!(result.error_for(&id(5)).is_none());
}

#[test]
fn malformed_location_and_date_are_rejected() {
    let mut definition = fixture();
    definition.fields[0].kind = form_spec::FieldType::Date;
    let mut answers = complete_answers();
    answers.insert(id(1), "2024-13-01".into());
    answers.insert(id(5), r#"{"lat":120,"lng":10}"#.into());

    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert_eq!(
        result.kinds(),
        vec![
            (id(1), ErrorKind::InvalidDate),
            (id(5), ErrorKind::InvalidLocation),
        ]
    );
}

#[test]
fn unknown_answer_ids_are_reported_but_not_errors() {
    let definition = fixture();
    let mut answers = complete_answers();
    let stray = Uuid::new_v4();
    answers.insert(stray, "ignored".into());
    let (_, result) = validate_answers(&definition.public_fields(), &answers);
    assert!(result.valid);
    assert_eq!(result.unknown_fields, vec![stray]);
}

#[test]
fn session_submission_values_drop_hidden_answers() {
    let definition = fixture();
    let mut session = FormSession::new(definition.public_fields(), VisibilityMode::Hidden);
    session.set_answer(id(3), "نعم");
    session.set_answer(id(4), "450");
    session.set_answer(id(1), "Amira");

    let values = session.submission_values();
    assert_eq!(values.get(&id(4)).map(String::as_str), Some("450"));

    session.set_answer(id(3), "لا");
    assert!(!session.submission_values().contains_key(&id(4)));
}

#[test]
fn definition_checks_options_and_dependencies() {
    let mut definition = fixture();
    assert!(definition.check().is_ok());

    definition.fields[2].options = None;
    assert!(matches!(
        definition.check(),
        Err(form_spec::DefinitionError::MissingOptions { .. })
    ));

    let mut definition = fixture();
    let controller = definition.fields[3].id;
    definition.fields[2].condition = Some(form_spec::FieldCondition {
        depends_on_field_id: controller,
        show_when_value: "1".into(),
    });
    assert!(matches!(
        definition.check(),
        Err(form_spec::DefinitionError::DependencyCycle { .. })
    ));
}
