use chrono::{Duration, TimeZone, Utc};
use paw_core::{CoreError, InMemoryWorkflowStore, WorkflowEngine};
use paw_domain::{Delay, DelayType, DelayUnit, EnrollmentStatus, ExecutionStatus, StepDraft, StepSchedule, WorkflowDraft};

fn engine() -> WorkflowEngine<InMemoryWorkflowStore> {
    WorkflowEngine::new(InMemoryWorkflowStore::new())
}

fn step(name: &str, schedule: StepSchedule) -> StepDraft {
    StepDraft::new(name, format!("{name} subject"), format!("<p>{name}</p>"), schedule)
}

#[test]
fn blank_names_are_rejected() {
    let engine = engine();
    let now = Utc::now();
    assert!(matches!(engine.create_workflow(&WorkflowDraft::new("  ", "", true), now),
                     Err(CoreError::Validation(_))));

    let wf = engine.create_workflow(&WorkflowDraft::new("Puppy basics", "", true), now)
                   .unwrap();
    let mut draft = step("Welcome", StepSchedule::Immediate);
    draft.email_subject = String::new();
    let err = engine.add_step(wf.id, &draft, now).unwrap_err();
    match err {
        CoreError::Validation(msg) => assert!(msg.contains("email_subject"), "{msg}"),
        other => panic!("esperaba Validation, obtuve {other:?}"),
    }
    assert!(engine.steps(wf.id).unwrap().is_empty());
}

#[test]
fn add_step_to_unknown_workflow_is_not_found() {
    let engine = engine();
    let err = engine.add_step(999, &step("x", StepSchedule::Immediate), Utc::now())
                    .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn unparseable_delay_never_reaches_the_store() {
    let err = StepSchedule::from_parts(DelayType::AfterPrevious, Some("three days"), None).unwrap_err();
    let err: CoreError = err.into();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn delays_beyond_ten_years_are_rejected() {
    let err = StepSchedule::from_parts(DelayType::AfterEnrollment, Some("100000000 weeks"), None).unwrap_err();
    assert!(matches!(CoreError::from(err), CoreError::Validation(_)));

    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    let huge = Delay::new(100_000_000, DelayUnit::Week);
    for schedule in [StepSchedule::AfterEnrollment(huge), StepSchedule::AfterPrevious(huge)] {
        let err = engine.add_step(wf.id, &step("far", schedule), now).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    }
    assert!(engine.steps(wf.id).unwrap().is_empty());

    engine.add_step(wf.id, &step("max", StepSchedule::AfterPrevious(Delay::new(520, DelayUnit::Week))), now)
          .unwrap();
    let en = engine.enroll(wf.id, 1, 1, now).unwrap();
    assert_eq!(engine.executions(en.id).unwrap()[0].scheduled_for, now + Duration::weeks(520));
}

#[test]
fn step_order_grows_and_deletion_leaves_gaps() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("Welcome Series", "", true), now)
                   .unwrap();
    let s1 = engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();
    let s2 = engine.add_step(wf.id, &step("two", StepSchedule::Immediate), now).unwrap();
    let s3 = engine.add_step(wf.id, &step("three", StepSchedule::Immediate), now).unwrap();
    assert_eq!((s1.step_order, s2.step_order, s3.step_order), (1, 2, 3));

    engine.delete_step(s2.id, now).unwrap();
    let orders: Vec<i32> = engine.steps(wf.id).unwrap().iter().map(|s| s.step_order).collect();
    assert_eq!(orders, vec![1, 3]);

    let s4 = engine.add_step(wf.id, &step("four", StepSchedule::Immediate), now).unwrap();
    assert_eq!(s4.step_order, 4);
}

#[test]
fn update_step_keeps_order() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    let s = engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();
    let later = now + Duration::minutes(5);
    let updated = engine.update_step(s.id,
                                     &step("renamed", StepSchedule::AfterEnrollment(Delay::new(2, DelayUnit::Day))),
                                     later)
                        .unwrap();
    assert_eq!(updated.step_order, 1);
    assert_eq!(updated.step_name, "renamed");
    assert_eq!(updated.updated_at, later);
    assert_eq!(updated.created_at, now);
}

#[test]
fn one_active_enrollment_per_client_and_workflow() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();

    let first = engine.enroll(wf.id, 42, 1, now).unwrap();
    assert_eq!(first.status, EnrollmentStatus::Active);
    assert_eq!(engine.enroll(wf.id, 42, 1, now).unwrap_err(),
               CoreError::AlreadyEnrolled { workflow_id: wf.id,
                                            client_id: 42 });

    let cancelled = engine.cancel(first.id, 9, now).unwrap();
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(9));

    let again = engine.enroll(wf.id, 42, 1, now).unwrap();
    assert_ne!(again.id, first.id);
    assert_eq!(engine.enrollments_for_client(42).unwrap().len(), 2);
}

#[test]
fn cancel_is_only_valid_from_active() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();
    let en = engine.enroll(wf.id, 1, 1, now).unwrap();
    engine.cancel(en.id, 1, now).unwrap();
    assert!(matches!(engine.cancel(en.id, 1, now), Err(CoreError::InvalidTransition(_))));
    assert!(matches!(engine.cancel(12345, 1, now), Err(CoreError::NotFound(_))));
}

#[test]
fn inactive_workflow_rejects_enrollment() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", false), now).unwrap();
    assert!(matches!(engine.enroll(wf.id, 1, 1, now), Err(CoreError::Validation(_))));
}

#[test]
fn workflow_without_steps_completes_on_enrollment() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("Empty", "", true), now).unwrap();
    let en = engine.enroll(wf.id, 1, 1, now).unwrap();
    assert_eq!(en.status, EnrollmentStatus::Completed);
    assert_eq!(en.completed_at, Some(now));
    // Ya no está activa: se puede volver a inscribir.
    assert!(engine.enroll(wf.id, 1, 1, now).is_ok());
}

#[test]
fn enrollment_materializes_one_pending_execution_per_step() {
    let engine = engine();
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let fixed = Utc.with_ymd_and_hms(2024, 2, 14, 10, 0, 0).unwrap();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), t).unwrap();
    engine.add_step(wf.id,
                    &step("week", StepSchedule::AfterEnrollment(Delay::new(1, DelayUnit::Week))),
                    t)
          .unwrap();
    engine.add_step(wf.id, &step("valentine", StepSchedule::SpecificDate(fixed)), t)
          .unwrap();

    let en = engine.enroll(wf.id, 5, 1, t).unwrap();
    let execs = engine.executions(en.id).unwrap();
    assert_eq!(execs.len(), 2);
    assert!(execs.iter().all(|e| e.status == ExecutionStatus::Pending));
    assert_eq!(execs[0].scheduled_for, t + Duration::days(7));
    assert_eq!(execs[1].scheduled_for, fixed);
}

#[test]
fn deleting_a_step_drops_only_its_pending_executions() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    let s1 = engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();
    let s2 = engine.add_step(wf.id, &step("two", StepSchedule::Immediate), now).unwrap();
    let en = engine.enroll(wf.id, 1, 1, now).unwrap();

    engine.delete_step(s2.id, now).unwrap();
    let execs = engine.executions(en.id).unwrap();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].step_id, s1.id);
}

#[test]
fn retry_requires_a_failed_execution() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    engine.add_step(wf.id, &step("one", StepSchedule::Immediate), now).unwrap();
    let en = engine.enroll(wf.id, 1, 1, now).unwrap();
    let exec = &engine.executions(en.id).unwrap()[0];
    assert!(matches!(engine.retry_execution(exec.id, 1, now), Err(CoreError::InvalidTransition(_))));
}

#[test]
fn update_workflow_toggles_active_flag() {
    let engine = engine();
    let now = Utc::now();
    let wf = engine.create_workflow(&WorkflowDraft::new("W", "", true), now).unwrap();
    let off = engine.update_workflow(wf.id, &WorkflowDraft::new("W2", "desc", false), now)
                    .unwrap();
    assert!(!off.active);
    assert_eq!(engine.get_workflow(wf.id).unwrap().name, "W2");
    assert_eq!(engine.list_workflows().unwrap().len(), 1);
}
