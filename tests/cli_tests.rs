use clap::Parser;
use pawflow::cli::{Command, CreditsCommand, StepCommand, WorkflowCommand};
use pawflow::Cli;
use paw_domain::{DelayType, StepSchedule};

#[test]
fn tick_accepts_global_flags() {
    let cli = Cli::try_parse_from(["pawflow", "tick", "--json", "--now", "2024-01-01T00:00:00Z"]).unwrap();
    assert_eq!(cli.command, Command::Tick);
    assert!(cli.json);
    assert_eq!(cli.now.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
}

#[test]
fn step_add_builds_a_normalized_draft() {
    let cli = Cli::try_parse_from(["pawflow",
                                   "step",
                                   "add",
                                   "--workflow",
                                   "3",
                                   "--name",
                                   "Tips",
                                   "--subject",
                                   "Training tips",
                                   "--body",
                                   "<p>Hi {client_name}</p>",
                                   "--delay-type",
                                   "after_previous",
                                   "--delay",
                                   "3 Days",
                                   "--contract-template",
                                   "7",
                                   "--appointment-link"]).unwrap();
    let Command::Step { command: StepCommand::Add { workflow, fields } } = cli.command else {
        panic!("expected step add");
    };
    assert_eq!(workflow, 3);
    assert_eq!(fields.delay_type, DelayType::AfterPrevious);
    let draft = fields.to_draft().unwrap();
    assert!(matches!(draft.schedule, StepSchedule::AfterPrevious(_)));
    assert_eq!(draft.schedule.delay_value().as_deref(), Some("3 days"));
    assert_eq!(draft.attachments.contract_template_id, Some(7));
    assert!(draft.attachments.include_appointment_link);
}

#[test]
fn unknown_delay_type_is_a_usage_error() {
    let err = Cli::try_parse_from(["pawflow", "step", "add", "--workflow", "1", "--name", "a", "--subject", "b", "--body", "c",
                                   "--delay-type", "whenever"]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn adjust_accepts_negative_amounts() {
    let cli = Cli::try_parse_from(["pawflow", "credits", "adjust", "--client", "9", "--amount", "-20", "--notes", "typo",
                                   "--actor", "1"]).unwrap();
    assert_eq!(cli.command,
               Command::Credits { command: CreditsCommand::Adjust { client: 9,
                                                                    amount: -20,
                                                                    notes: "typo".into(),
                                                                    actor: 1 } });
}

#[test]
fn workflow_create_defaults_to_active() {
    let cli = Cli::try_parse_from(["pawflow", "workflow", "create", "--name", "Welcome Series"]).unwrap();
    let Command::Workflow { command: WorkflowCommand::Create(fields) } = cli.command else {
        panic!("expected workflow create");
    };
    let draft = fields.to_draft();
    assert!(draft.active);
    assert_eq!(draft.description, "");
}

#[test]
fn enroll_requires_an_actor() {
    assert!(Cli::try_parse_from(["pawflow", "enroll", "--workflow", "1", "--client", "2"]).is_err());
}
