//! Cableado de la aplicación: engine, ledger y despachador sobre los stores
//! elegidos, y ejecución de los comandos del CLI.

use chrono::{DateTime, Utc};
use log::{debug, info};
use paw_adapters::{BaseUrlLinkBuilder, LogMailer};
use paw_core::{charge_booking, BookingCharge, ChargeOutcome, ClientDirectory, CreditLedger, Dispatcher, EmailSender, LedgerStore,
               LinkBuilder, NoLinks, PlaceholderRenderer, WorkflowEngine, WorkflowStore};
use paw_domain::{CreditTransaction, Enrollment, StepExecution, Workflow, WorkflowStep};
use paw_persistence::{build_pool_from_env, PgClientDirectory, PgLedgerStore, PgOutboxMailer, PgWorkflowStore, PoolProvider};
use serde::Serialize;
use serde_json::json;

use crate::cli::{Command, CreditsCommand, StepCommand, WorkflowCommand};
use crate::config::{AppConfig, MailerKind};
use crate::errors::AppError;

pub type AppDispatcher<W> =
    Dispatcher<W, Box<dyn EmailSender>, Box<dyn ClientDirectory>, PlaceholderRenderer, Box<dyn LinkBuilder>>;

/// Aplicación sobre Postgres.
pub type PgApp = App<PgWorkflowStore<PoolProvider>, PgLedgerStore<PoolProvider>>;

pub struct App<W: WorkflowStore, L: LedgerStore> {
    engine: WorkflowEngine<W>,
    ledger: CreditLedger<L>,
    dispatcher: AppDispatcher<W>,
}

/// Resultado de un comando: texto para humanos y JSON para `--json`.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub text: String,
    pub json: serde_json::Value,
}

impl Output {
    fn new<T: Serialize + ?Sized>(text: impl Into<String>, value: &T) -> Result<Self, AppError> {
        Ok(Self { text: text.into(),
                  json: serde_json::to_value(value)? })
    }

    pub fn render(&self, as_json: bool) -> Result<String, AppError> {
        if as_json {
            Ok(serde_json::to_string_pretty(&self.json)?)
        } else {
            Ok(self.text.clone())
        }
    }
}

impl<W, L> App<W, L>
    where W: WorkflowStore + Clone,
          L: LedgerStore
{
    pub fn new(workflows: W,
               ledger: L,
               mailer: Box<dyn EmailSender>,
               directory: Box<dyn ClientDirectory>,
               config: &AppConfig)
               -> Result<Self, AppError> {
        let links: Box<dyn LinkBuilder> = match &config.share_base_url {
            Some(base) => Box::new(BaseUrlLinkBuilder::new(base)?),
            None => Box::new(NoLinks),
        };
        let dispatcher = Dispatcher::builder(workflows.clone(), mailer, directory).links(links)
                                                                                  .config(config.dispatch)
                                                                                  .build();
        Ok(Self { engine: WorkflowEngine::new(workflows),
                  ledger: CreditLedger::new(ledger),
                  dispatcher })
    }

    pub fn engine(&self) -> &WorkflowEngine<W> {
        &self.engine
    }

    pub fn ledger(&self) -> &CreditLedger<L> {
        &self.ledger
    }

    pub fn execute(&self, command: &Command, now: DateTime<Utc>) -> Result<Output, AppError> {
        debug!("execute command={command:?} now={now}");
        match command {
            Command::Tick => {
                let r = self.dispatcher.tick(now)?;
                Output::new(format!("tick {}: expired_claims={} claimed={} completed={} failed={} enrollments_completed={}",
                                    r.tick_id, r.expired_claims, r.claimed, r.completed, r.failed, r.enrollments_completed),
                            &r)
            }
            Command::Workflow { command } => self.workflow(command, now),
            Command::Step { command } => self.step(command, now),
            Command::Enroll { workflow, client, actor } => {
                let en = self.engine.enroll(*workflow, *client, *actor, now)?;
                Output::new(format!("enrollment {} created (workflow {}, client {})", en.id, en.workflow_id, en.client_id),
                            &en)
            }
            Command::Cancel { enrollment, actor } => {
                let en = self.engine.cancel(*enrollment, *actor, now)?;
                Output::new(format!("enrollment {} cancelled", en.id), &en)
            }
            Command::Retry { execution, actor } => {
                let exec = self.engine.retry_execution(*execution, *actor, now)?;
                Output::new(format!("execution {} pending again, scheduled_for={}", exec.id, exec.scheduled_for),
                            &exec)
            }
            Command::Enrollments { client } => {
                let list = self.engine.enrollments_for_client(*client)?;
                Output::new(enrollment_lines(&list), &list)
            }
            Command::Progress { enrollment } => {
                let execs = self.engine.executions(*enrollment)?;
                Output::new(execution_lines(&execs), &execs)
            }
            Command::Credits { command } => self.credits(command, now),
        }
    }

    fn workflow(&self, command: &WorkflowCommand, now: DateTime<Utc>) -> Result<Output, AppError> {
        match command {
            WorkflowCommand::Create(fields) => {
                let wf = self.engine.create_workflow(&fields.to_draft(), now)?;
                Output::new(format!("workflow {} created: {}", wf.id, wf.name), &wf)
            }
            WorkflowCommand::Update { id, fields } => {
                let wf = self.engine.update_workflow(*id, &fields.to_draft(), now)?;
                Output::new(format!("workflow {} updated", wf.id), &wf)
            }
            WorkflowCommand::List => {
                let list = self.engine.list_workflows()?;
                Output::new(list.iter().map(workflow_line).collect::<Vec<_>>().join("\n"), &list)
            }
            WorkflowCommand::Show { id } => {
                let wf = self.engine.get_workflow(*id)?;
                let steps = self.engine.steps(*id)?;
                let text = format!("{}\n{}", workflow_line(&wf), step_lines(&steps));
                Output::new(text, &json!({ "workflow": wf, "steps": steps }))
            }
        }
    }

    fn step(&self, command: &StepCommand, now: DateTime<Utc>) -> Result<Output, AppError> {
        match command {
            StepCommand::Add { workflow, fields } => {
                let step = self.engine.add_step(*workflow, &fields.to_draft()?, now)?;
                Output::new(format!("step {} added at position {}", step.id, step.step_order), &step)
            }
            StepCommand::Update { id, fields } => {
                let step = self.engine.update_step(*id, &fields.to_draft()?, now)?;
                Output::new(format!("step {} updated", step.id), &step)
            }
            StepCommand::Delete { id } => {
                self.engine.delete_step(*id, now)?;
                Output::new(format!("step {id} deleted"), &json!({ "deleted": id }))
            }
            StepCommand::List { workflow } => {
                let steps = self.engine.steps(*workflow)?;
                Output::new(step_lines(&steps), &steps)
            }
        }
    }

    fn credits(&self, command: &CreditsCommand, now: DateTime<Utc>) -> Result<Output, AppError> {
        match command {
            CreditsCommand::Balance { client } => {
                let credits = self.ledger.ledger(*client, now)?;
                Output::new(format!("client {client}: balance={} purchased={} consumed={} adjusted={} expired={}",
                                    credits.credit_balance,
                                    credits.total_purchased,
                                    credits.total_consumed,
                                    credits.total_adjusted,
                                    credits.total_expired),
                            &credits)
            }
            CreditsCommand::History { client } => {
                let history = self.ledger.history(*client)?;
                Output::new(history.iter().map(transaction_line).collect::<Vec<_>>().join("\n"), &history)
            }
            CreditsCommand::Purchase { client, amount, notes, actor } => {
                let tx = self.ledger.purchase(*client, *amount, notes.as_deref(), *actor, now)?;
                Output::new(transaction_line(&tx), &tx)
            }
            CreditsCommand::Consume { client, amount, booking, actor } => {
                let tx = self.ledger.consume(*client, *amount, *booking, *actor, now)?;
                Output::new(transaction_line(&tx), &tx)
            }
            CreditsCommand::Adjust { client, amount, notes, actor } => {
                let tx = self.ledger.adjust(*client, *amount, notes, *actor, now)?;
                Output::new(transaction_line(&tx), &tx)
            }
            CreditsCommand::Expiration { client, days } => {
                let credits = self.ledger.configure_expiration(*client, days.is_some(), *days, now)?;
                let text = match credits.expiration_days {
                    Some(d) if credits.credits_expire => format!("client {client}: credits expire {d} days after last purchase"),
                    _ => format!("client {client}: credits never expire"),
                };
                Output::new(text, &credits)
            }
            CreditsCommand::Expire { client, actor } => match self.ledger.expire_if_due(*client, *actor, now)? {
                Some(tx) => Output::new(transaction_line(&tx), &tx),
                None => Output::new(format!("client {client}: nothing to expire"), &json!(null)),
            },
            CreditsCommand::Charge { booking, client, credits_required, override_credits, actor } => {
                let charge = BookingCharge { booking_id: *booking,
                                             client_id: *client,
                                             credits_required: *credits_required,
                                             override_credits: *override_credits,
                                             actor: *actor };
                match charge_booking(&self.ledger, &charge, now)? {
                    ChargeOutcome::NotRequired => {
                        Output::new(format!("booking {booking}: no credits required"), &json!({ "outcome": "not_required" }))
                    }
                    ChargeOutcome::Overridden => Output::new(format!("booking {booking}: credits overridden by {actor}"),
                                                             &json!({ "outcome": "overridden" })),
                    ChargeOutcome::Consumed(tx) => Output::new(transaction_line(&tx),
                                                               &json!({ "outcome": "consumed", "transaction": tx })),
                }
            }
        }
    }
}

/// Arma la aplicación sobre Postgres (pool ya migrado) según `config`.
pub fn connect(config: &AppConfig) -> Result<PgApp, AppError> {
    let provider = PoolProvider::new(build_pool_from_env()?);
    let mailer: Box<dyn EmailSender> = match config.mailer {
        MailerKind::Log => Box::new(match &config.mail_from {
                               Some(from) => LogMailer::with_from(from.as_str()),
                               None => LogMailer::new(),
                           }),
        MailerKind::Outbox => Box::new(PgOutboxMailer::new(provider.clone())),
    };
    info!("pawflow connected mailer={:?} share_links={}", config.mailer, config.share_base_url.is_some());
    App::new(PgWorkflowStore::new(provider.clone()),
             PgLedgerStore::new(provider.clone()),
             mailer,
             Box::new(PgClientDirectory::new(provider)),
             config)
}

fn workflow_line(wf: &Workflow) -> String {
    format!("{}\t{}\t{}", wf.id, wf.name, if wf.active { "active" } else { "inactive" })
}

fn step_lines(steps: &[WorkflowStep]) -> String {
    steps.iter()
         .map(|s| {
             let when = match (s.schedule.delay_value(), s.schedule.scheduled_date()) {
                 (Some(delay), _) => format!("{} {delay}", s.schedule.delay_type()),
                 (None, Some(date)) => format!("{} {}", s.schedule.delay_type(), date.to_rfc3339()),
                 (None, None) => s.schedule.delay_type().to_string(),
             };
             format!("{}. [{}] {} ({when})", s.step_order, s.id, s.step_name)
         })
         .collect::<Vec<_>>()
         .join("\n")
}

fn enrollment_lines(list: &[Enrollment]) -> String {
    list.iter()
        .map(|e| format!("{}\tworkflow={}\t{}\tenrolled_at={}", e.id, e.workflow_id, e.status, e.enrolled_at.to_rfc3339()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn execution_lines(execs: &[StepExecution]) -> String {
    execs.iter()
         .map(|x| {
             let mut line = format!("{}. [{}] {} scheduled_for={}", x.step_order, x.id, x.status, x.scheduled_for.to_rfc3339());
             if let Some(err) = &x.error_message {
                 line.push_str(&format!(" error={err:?}"));
             }
             line
         })
         .collect::<Vec<_>>()
         .join("\n")
}

fn transaction_line(tx: &CreditTransaction) -> String {
    format!("{}\t{}\t{:+}\t{} -> {}",
            tx.id, tx.transaction_type, tx.amount, tx.balance_before, tx.balance_after)
}
