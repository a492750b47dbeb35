use chrono::{TimeZone, Utc};
use paw_domain::{Delay, DelayType, DelayUnit, StepDraft, StepSchedule, TransactionType, WorkflowDraft};
use serde_json::json;

#[test]
fn test_workflow_draft_requires_name() {
    assert!(WorkflowDraft::new("Welcome Series", "", true).validate().is_ok());
    assert!(WorkflowDraft::new("   ", "sin nombre", true).validate().is_err());
}

#[test]
fn test_step_schedule_json_shape() {
    // La forma JSON es la que ve la salida `--json` del CLI
    let s = StepSchedule::AfterPrevious(Delay::new(3, DelayUnit::Day));
    let v = serde_json::to_value(s).unwrap();
    assert_eq!(v, json!({"type": "after_previous", "value": {"magnitude": 3, "unit": "day"}}));

    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let back: StepSchedule = serde_json::from_value(serde_json::to_value(StepSchedule::SpecificDate(at)).unwrap()).unwrap();
    assert_eq!(back, StepSchedule::SpecificDate(at));
}

#[test]
fn test_step_draft_from_operator_form() {
    let schedule = StepSchedule::from_parts(DelayType::AfterEnrollment, Some("1 week"), None).unwrap();
    let draft = StepDraft::new("Recordatorio", "Hola {client_name}", "<p>Bienvenido a {workflow_name}</p>", schedule);
    assert!(draft.validate().is_ok());
    assert_eq!(draft.schedule.delay_value().as_deref(), Some("1 week"));
    assert_eq!(draft.schedule.delay_type(), DelayType::AfterEnrollment);
}

#[test]
fn test_unparseable_delay_is_a_validation_error() {
    let err = StepSchedule::from_parts(DelayType::AfterPrevious, Some("a while"), None).unwrap_err();
    assert!(matches!(err, paw_domain::DomainError::ValidationError(_)));
}

#[test]
fn test_transaction_type_text() {
    assert_eq!(TransactionType::Expiration.to_string(), "expiration");
    assert_eq!("consume".parse::<TransactionType>().unwrap(), TransactionType::Consume);
}
