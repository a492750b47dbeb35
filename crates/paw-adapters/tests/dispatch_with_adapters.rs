use chrono::{TimeZone, Utc};
use paw_adapters::{BaseUrlLinkBuilder, LogMailer};
use paw_core::{Dispatcher, InMemoryClientDirectory, InMemoryWorkflowStore, WorkflowEngine};
use paw_domain::{ClientContact, EnrollmentStatus, ExecutionStatus, StepDraft, StepSchedule, WorkflowDraft};

#[test]
fn log_mailer_and_base_url_links_complete_a_sequence() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let store = InMemoryWorkflowStore::new();
    let engine = WorkflowEngine::new(store.clone());
    let directory = InMemoryClientDirectory::new();
    directory.insert(ClientContact { client_id: 5,
                                     name: "Luis".into(),
                                     email: "luis@example.com".into() });
    directory.insert(ClientContact { client_id: 6,
                                     name: "Sin correo".into(),
                                     email: String::new() });
    let links = BaseUrlLinkBuilder::new("https://studio.example.com").unwrap();
    let dispatcher = Dispatcher::builder(store, LogMailer::with_from("studio@example.com"), directory).links(links)
                                                                                                       .build();

    let wf = engine.create_workflow(&WorkflowDraft::new("Intake", "", true), t0).unwrap();
    let mut draft = StepDraft::new("Forms", "Forms", "<p>{form_link}</p>", StepSchedule::Immediate);
    draft.attachments.form_template_id = Some(2);
    engine.add_step(wf.id, &draft, t0).unwrap();
    let ok = engine.enroll(wf.id, 5, 1, t0).unwrap();
    let bad = engine.enroll(wf.id, 6, 1, t0).unwrap();

    let report = dispatcher.tick(t0).unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(engine.enrollment(ok.id).unwrap().status, EnrollmentStatus::Completed);

    let failed = &engine.executions(bad.id).unwrap()[0];
    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert!(failed.error_message.as_deref().unwrap().contains("has no email address"));
    assert_eq!(engine.enrollment(bad.id).unwrap().status, EnrollmentStatus::Active);
}
