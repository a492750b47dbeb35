//! Definición del CLI `pawflow`.
//!
//! `pawflow tick` es el punto de entrada del cron del despachador; el resto
//! de los comandos son las operaciones del operador (workflows, steps,
//! inscripciones y créditos).

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use paw_domain::{DelayType, DomainError, StepAttachments, StepDraft, StepSchedule, WorkflowDraft};

#[derive(Parser, Debug)]
#[command(name = "pawflow")]
#[command(about = "Email workflows and client credits for a pet-services business")]
#[command(long_about = "Pawflow runs automated email sequences for enrolled clients and keeps the \
                       prepaid credit ledger. Schedule 'pawflow tick' from cron to send due emails.")]
pub struct Cli {
    /// Imprime el resultado como JSON
    #[arg(long, global = true, help = "Print the result as JSON")]
    pub json: bool,
    /// Instante de referencia (RFC 3339); por defecto, ahora
    #[arg(long, global = true, value_name = "RFC3339", help = "Reference time for the command (defaults to now)")]
    pub now: Option<DateTime<Utc>>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send every due step email (run from cron)
    Tick,
    /// Create, edit and inspect workflows
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Manage the steps of a workflow
    Step {
        #[command(subcommand)]
        command: StepCommand,
    },
    /// Enroll a client in a workflow
    Enroll {
        #[arg(long)]
        workflow: i64,
        #[arg(long)]
        client: i64,
        #[arg(long, help = "Staff user performing the enrollment")]
        actor: i64,
    },
    /// Cancel an active enrollment
    Cancel {
        #[arg(long)]
        enrollment: i64,
        #[arg(long)]
        actor: i64,
    },
    /// Put a failed step execution back in the queue
    Retry {
        #[arg(long)]
        execution: i64,
        #[arg(long)]
        actor: i64,
    },
    /// List a client's enrollments
    Enrollments {
        #[arg(long)]
        client: i64,
    },
    /// Show the step executions of an enrollment
    Progress {
        #[arg(long)]
        enrollment: i64,
    },
    /// Client credit ledger
    Credits {
        #[command(subcommand)]
        command: CreditsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    Create(WorkflowArgs),
    Update {
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        fields: WorkflowArgs,
    },
    List,
    /// Workflow with its steps
    Show {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, help = "Create or leave the workflow inactive (no new enrollments)")]
    pub inactive: bool,
}

impl WorkflowArgs {
    pub fn to_draft(&self) -> WorkflowDraft {
        WorkflowDraft::new(self.name.clone(), self.description.clone(), !self.inactive)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StepCommand {
    Add {
        #[arg(long)]
        workflow: i64,
        #[command(flatten)]
        fields: StepArgs,
    },
    Update {
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        fields: StepArgs,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        workflow: i64,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StepArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub subject: String,
    #[arg(long, help = "HTML body; placeholders like {client_name} are filled at send time")]
    pub body: String,
    #[arg(long)]
    pub body_text: Option<String>,
    #[arg(long, default_value = "immediate", help = "immediate | after_enrollment | after_previous | specific_date")]
    pub delay_type: DelayType,
    #[arg(long, help = "Relative delay such as '3 days', '2 hours', '1 week'")]
    pub delay: Option<String>,
    #[arg(long, value_name = "RFC3339")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[arg(long)]
    pub contract_template: Option<i64>,
    #[arg(long)]
    pub form_template: Option<i64>,
    #[arg(long)]
    pub appointment_link: bool,
    #[arg(long)]
    pub appointment_type: Option<i64>,
}

impl StepArgs {
    /// El delay se parsea acá: un texto inválido nunca llega al engine.
    pub fn to_draft(&self) -> Result<StepDraft, DomainError> {
        let schedule = StepSchedule::from_parts(self.delay_type, self.delay.as_deref(), self.scheduled_date)?;
        let mut draft = StepDraft::new(self.name.clone(), self.subject.clone(), self.body.clone(), schedule);
        draft.email_body_text = self.body_text.clone();
        draft.attachments = StepAttachments { contract_template_id: self.contract_template,
                                              form_template_id: self.form_template,
                                              include_appointment_link: self.appointment_link,
                                              appointment_type_id: self.appointment_type };
        Ok(draft)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CreditsCommand {
    Balance {
        #[arg(long)]
        client: i64,
    },
    History {
        #[arg(long)]
        client: i64,
    },
    Purchase {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        actor: i64,
    },
    Consume {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        booking: i64,
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Signed manual adjustment; requires a justification note
    Adjust {
        #[arg(long)]
        client: i64,
        #[arg(long, allow_negative_numbers = true)]
        amount: i64,
        #[arg(long)]
        notes: String,
        #[arg(long)]
        actor: i64,
    },
    /// Configure credit expiration for a client
    Expiration {
        #[arg(long)]
        client: i64,
        #[arg(long, help = "Days after the last purchase; omit to disable expiration")]
        days: Option<i32>,
    },
    /// Expire the remaining balance if the expiration period has passed
    Expire {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        actor: Option<i64>,
    },
    /// Charge the credits a booking requires
    Charge {
        #[arg(long)]
        booking: i64,
        #[arg(long)]
        client: i64,
        #[arg(long)]
        credits_required: i64,
        #[arg(long, help = "Book without consuming credits")]
        override_credits: bool,
        #[arg(long)]
        actor: i64,
    },
}
