use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use paw_core::{DeliveryError, EmailSender, InMemoryClientDirectory, InMemoryLedgerStore, InMemoryWorkflowStore, OutgoingEmail};
use paw_domain::ClientContact;
use pawflow::errors::{EXIT_REJECTED, EXIT_USAGE};
use pawflow::{App, AppConfig, AppError, Cli, Output};

#[derive(Debug, Default, Clone)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl EmailSender for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

type MemApp = App<InMemoryWorkflowStore, InMemoryLedgerStore>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn app(config: &AppConfig) -> (MemApp, RecordingMailer) {
    let mailer = RecordingMailer::default();
    let directory = InMemoryClientDirectory::new();
    directory.insert(ClientContact { client_id: 42,
                                     name: "Ana".into(),
                                     email: "ana@example.com".into() });
    let app = App::new(InMemoryWorkflowStore::new(),
                       InMemoryLedgerStore::new(),
                       Box::new(mailer.clone()),
                       Box::new(directory),
                       config).unwrap();
    (app, mailer)
}

fn run(app: &MemApp, args: &[&str], now: DateTime<Utc>) -> Result<Output, AppError> {
    let cli = Cli::try_parse_from(std::iter::once("pawflow").chain(args.iter().copied())).unwrap();
    app.execute(&cli.command, now)
}

#[test]
fn welcome_series_from_the_command_line() {
    let (app, mailer) = app(&AppConfig::default());
    let wf = run(&app, &["workflow", "create", "--name", "Welcome Series"], t0()).unwrap();
    let wf_id = wf.json["id"].as_i64().unwrap().to_string();
    run(&app,
        &["step", "add", "--workflow", &wf_id, "--name", "Hello", "--subject", "Welcome {client_name}", "--body", "<p>Hi</p>"],
        t0()).unwrap();
    run(&app,
        &["step", "add", "--workflow", &wf_id, "--name", "Tips", "--subject", "Tips", "--body", "<p>Tips</p>",
          "--delay-type", "after_previous", "--delay", "3 days"],
        t0()).unwrap();
    let en = run(&app, &["enroll", "--workflow", &wf_id, "--client", "42", "--actor", "1"], t0()).unwrap();
    let en_id = en.json["id"].as_i64().unwrap().to_string();

    let tick = run(&app, &["tick"], t0()).unwrap();
    assert_eq!(tick.json["completed"], 1);
    assert!(tick.text.starts_with("tick "), "{}", tick.text);
    assert_eq!(mailer.sent.lock().unwrap()[0].subject, "Welcome Ana");

    let progress = run(&app, &["progress", "--enrollment", &en_id], t0()).unwrap();
    assert_eq!(progress.json[0]["status"], "completed");
    assert_eq!(progress.json[1]["status"], "pending");

    let show = run(&app, &["workflow", "show", "--id", &wf_id], t0()).unwrap();
    assert_eq!(show.json["steps"].as_array().unwrap().len(), 2);
    assert!(show.text.contains("2. ["), "{}", show.text);
    assert!(show.text.contains("after_previous 3 days"), "{}", show.text);

    let again = run(&app, &["enroll", "--workflow", &wf_id, "--client", "42", "--actor", "1"], t0()).unwrap_err();
    assert_eq!(again.exit_code(), EXIT_REJECTED);
}

#[test]
fn bad_delay_text_is_a_validation_exit() {
    let (app, _) = app(&AppConfig::default());
    let wf = run(&app, &["workflow", "create", "--name", "W"], t0()).unwrap();
    let wf_id = wf.json["id"].as_i64().unwrap().to_string();
    let err = run(&app,
                  &["step", "add", "--workflow", &wf_id, "--name", "a", "--subject", "b", "--body", "c",
                    "--delay-type", "after_enrollment", "--delay", "soon-ish"],
                  t0()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_USAGE);
}

#[test]
fn credits_commands_follow_the_ledger_rules() {
    let (app, _) = app(&AppConfig::default());
    run(&app, &["credits", "adjust", "--client", "7", "--amount", "10", "--notes", "welcome bonus", "--actor", "1"], t0()).unwrap();
    let used = run(&app, &["credits", "consume", "--client", "7", "--amount", "3", "--booking", "55"], t0()).unwrap();
    assert_eq!(used.json["balance_after"], 7);

    let rejected = run(&app, &["credits", "adjust", "--client", "7", "--amount", "-20", "--notes", "oops", "--actor", "1"],
                       t0()).unwrap_err();
    assert_eq!(rejected.exit_code(), EXIT_REJECTED);

    let override_out = run(&app,
                           &["credits", "charge", "--booking", "56", "--client", "7", "--credits-required", "9",
                             "--override-credits", "--actor", "1"],
                           t0()).unwrap();
    assert_eq!(override_out.json["outcome"], "overridden");

    let balance = run(&app, &["credits", "balance", "--client", "7"], t0()).unwrap();
    assert_eq!(balance.json["credit_balance"], 7);
    assert_eq!(balance.render(false).unwrap(),
               "client 7: balance=7 purchased=0 consumed=3 adjusted=10 expired=0");

    let history = run(&app, &["credits", "history", "--client", "7"], t0()).unwrap();
    assert_eq!(history.json.as_array().unwrap().len(), 2);
    assert!(history.render(true).unwrap().contains("\"balance_before\": 10"));
}

#[test]
fn share_links_come_from_the_configured_base() {
    let config = AppConfig { share_base_url: Some("https://studio.example.com".into()),
                             ..AppConfig::default() };
    let (app, mailer) = app(&config);
    let wf = run(&app, &["workflow", "create", "--name", "Onboarding"], t0()).unwrap();
    let wf_id = wf.json["id"].as_i64().unwrap().to_string();
    run(&app,
        &["step", "add", "--workflow", &wf_id, "--name", "Sign", "--subject", "Sign", "--body", "<p>{contract_link}</p>",
          "--contract-template", "3"],
        t0()).unwrap();
    run(&app, &["enroll", "--workflow", &wf_id, "--client", "42", "--actor", "1"], t0()).unwrap();
    run(&app, &["tick"], t0()).unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent[0].html_body, "<p>https://studio.example.com/contracts/3/sign?client=42</p>");
}

#[test]
fn invalid_share_base_is_rejected_at_startup() {
    let config = AppConfig { share_base_url: Some("studio.example.com".into()),
                             ..AppConfig::default() };
    let err = App::new(InMemoryWorkflowStore::new(),
                       InMemoryLedgerStore::new(),
                       Box::new(RecordingMailer::default()),
                       Box::new(InMemoryClientDirectory::new()),
                       &config).err()
                                .unwrap();
    assert_eq!(err.exit_code(), EXIT_USAGE);
}
