//! Filas Diesel y su mapeo a tipos de dominio.
//!
//! Los enums del dominio se guardan como texto en minúsculas (ver CHECKs de
//! la migración); un valor desconocido al leer es una fila corrupta.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use paw_domain::{ClientCredits, CreditTransaction, DelayType, DomainError, Enrollment, NewCreditTransaction, NewEnrollment,
                 NewStepExecution, StepAttachments, StepDraft, StepExecution, StepSchedule, Workflow, WorkflowStep};

use crate::error::PersistenceError;
use crate::schema::{client_credits, clients, credit_transactions, email_outbox, workflow_enrollments, workflow_step_executions,
                    workflow_steps, workflows};

fn corrupt(table: &str, id: i64, e: DomainError) -> PersistenceError {
    PersistenceError::CorruptRow(format!("{table} id={id}: {e}"))
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = workflows, check_for_backend(diesel::pg::Pg))]
pub struct WorkflowRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkflowRow> for Workflow {
    fn from(r: WorkflowRow) -> Self {
        Workflow { id: r.id,
                   name: r.name,
                   description: r.description,
                   active: r.active,
                   created_at: r.created_at,
                   updated_at: r.updated_at }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflows)]
pub struct NewWorkflowRow<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = workflow_steps, check_for_backend(diesel::pg::Pg))]
pub struct StepRow {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i32,
    pub step_name: String,
    pub email_subject: String,
    pub email_body: String,
    pub email_body_text: Option<String>,
    pub delay_type: String,
    pub delay_value: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub contract_template_id: Option<i64>,
    pub form_template_id: Option<i64>,
    pub include_appointment_link: bool,
    pub appointment_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StepRow> for WorkflowStep {
    type Error = PersistenceError;

    fn try_from(r: StepRow) -> Result<Self, Self::Error> {
        let delay_type: DelayType = r.delay_type.parse().map_err(|e| corrupt("workflow_steps", r.id, e))?;
        let schedule = StepSchedule::from_parts(delay_type, r.delay_value.as_deref(), r.scheduled_date)
            .map_err(|e| corrupt("workflow_steps", r.id, e))?;
        Ok(WorkflowStep { id: r.id,
                          workflow_id: r.workflow_id,
                          step_order: r.step_order,
                          step_name: r.step_name,
                          email_subject: r.email_subject,
                          email_body: r.email_body,
                          email_body_text: r.email_body_text,
                          schedule,
                          attachments: StepAttachments { contract_template_id: r.contract_template_id,
                                                         form_template_id: r.form_template_id,
                                                         include_appointment_link: r.include_appointment_link,
                                                         appointment_type_id: r.appointment_type_id },
                          created_at: r.created_at,
                          updated_at: r.updated_at })
    }
}

/// Columnas editables de un step (alta y edición comparten forma).
#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = workflow_steps, treat_none_as_null = true)]
pub struct StepFieldsRow {
    pub step_name: String,
    pub email_subject: String,
    pub email_body: String,
    pub email_body_text: Option<String>,
    pub delay_type: &'static str,
    pub delay_value: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub contract_template_id: Option<i64>,
    pub form_template_id: Option<i64>,
    pub include_appointment_link: bool,
    pub appointment_type_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl StepFieldsRow {
    pub fn new(draft: &StepDraft, now: DateTime<Utc>) -> Self {
        let a = &draft.attachments;
        Self { step_name: draft.step_name.clone(),
               email_subject: draft.email_subject.clone(),
               email_body: draft.email_body.clone(),
               email_body_text: draft.email_body_text.clone(),
               delay_type: draft.schedule.delay_type().as_str(),
               delay_value: draft.schedule.delay_value(),
               scheduled_date: draft.schedule.scheduled_date(),
               contract_template_id: a.contract_template_id,
               form_template_id: a.form_template_id,
               include_appointment_link: a.include_appointment_link,
               appointment_type_id: a.appointment_type_id,
               updated_at: now }
    }

    pub fn from_step(step: &WorkflowStep) -> Self {
        let draft = StepDraft { step_name: step.step_name.clone(),
                                email_subject: step.email_subject.clone(),
                                email_body: step.email_body.clone(),
                                email_body_text: step.email_body_text.clone(),
                                schedule: step.schedule,
                                attachments: step.attachments.clone() };
        Self::new(&draft, step.updated_at)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_steps)]
pub struct NewStepRow {
    pub workflow_id: i64,
    pub step_order: i32,
    pub created_at: DateTime<Utc>,
    #[diesel(embed)]
    pub fields: StepFieldsRow,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = workflow_enrollments, check_for_backend(diesel::pg::Pg))]
pub struct EnrollmentRow {
    pub id: i64,
    pub workflow_id: i64,
    pub client_id: i64,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = PersistenceError;

    fn try_from(r: EnrollmentRow) -> Result<Self, Self::Error> {
        Ok(Enrollment { id: r.id,
                        workflow_id: r.workflow_id,
                        client_id: r.client_id,
                        status: r.status.parse().map_err(|e| corrupt("workflow_enrollments", r.id, e))?,
                        enrolled_at: r.enrolled_at,
                        enrolled_by: r.enrolled_by,
                        completed_at: r.completed_at,
                        cancelled_at: r.cancelled_at,
                        cancelled_by: r.cancelled_by })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_enrollments)]
pub struct NewEnrollmentRow {
    pub workflow_id: i64,
    pub client_id: i64,
    pub status: &'static str,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&NewEnrollment> for NewEnrollmentRow {
    fn from(n: &NewEnrollment) -> Self {
        Self { workflow_id: n.workflow_id,
               client_id: n.client_id,
               status: n.status.as_str(),
               enrolled_at: n.enrolled_at,
               enrolled_by: n.enrolled_by,
               completed_at: n.completed_at }
    }
}

#[derive(Queryable, QueryableByName, Selectable, Debug)]
#[diesel(table_name = workflow_step_executions, check_for_backend(diesel::pg::Pg))]
pub struct ExecutionRow {
    pub id: i64,
    pub enrollment_id: i64,
    pub step_id: i64,
    pub step_order: i32,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl TryFrom<ExecutionRow> for StepExecution {
    type Error = PersistenceError;

    fn try_from(r: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(StepExecution { id: r.id,
                           enrollment_id: r.enrollment_id,
                           step_id: r.step_id,
                           step_order: r.step_order,
                           status: r.status.parse().map_err(|e| corrupt("workflow_step_executions", r.id, e))?,
                           scheduled_for: r.scheduled_for,
                           claimed_at: r.claimed_at,
                           claimed_by: r.claimed_by,
                           executed_at: r.executed_at,
                           error_message: r.error_message })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_step_executions)]
pub struct NewExecutionRow {
    pub enrollment_id: i64,
    pub step_id: i64,
    pub step_order: i32,
    pub status: &'static str,
    pub scheduled_for: DateTime<Utc>,
}

impl From<&NewStepExecution> for NewExecutionRow {
    fn from(n: &NewStepExecution) -> Self {
        Self { enrollment_id: n.enrollment_id,
               step_id: n.step_id,
               step_order: n.step_order,
               status: paw_domain::ExecutionStatus::Pending.as_str(),
               scheduled_for: n.scheduled_for }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = client_credits, check_for_backend(diesel::pg::Pg))]
pub struct CreditsRow {
    pub client_id: i64,
    pub credit_balance: i64,
    pub total_purchased: i64,
    pub total_consumed: i64,
    pub total_adjusted: i64,
    pub total_expired: i64,
    pub credits_expire: bool,
    pub expiration_days: Option<i32>,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<CreditsRow> for ClientCredits {
    fn from(r: CreditsRow) -> Self {
        ClientCredits { client_id: r.client_id,
                        credit_balance: r.credit_balance,
                        total_purchased: r.total_purchased,
                        total_consumed: r.total_consumed,
                        total_adjusted: r.total_adjusted,
                        total_expired: r.total_expired,
                        credits_expire: r.credits_expire,
                        expiration_days: r.expiration_days,
                        last_purchase_at: r.last_purchase_at,
                        updated_at: r.updated_at }
    }
}

impl From<&ClientCredits> for CreditsRow {
    fn from(c: &ClientCredits) -> Self {
        Self { client_id: c.client_id,
               credit_balance: c.credit_balance,
               total_purchased: c.total_purchased,
               total_consumed: c.total_consumed,
               total_adjusted: c.total_adjusted,
               total_expired: c.total_expired,
               credits_expire: c.credits_expire,
               expiration_days: c.expiration_days,
               last_purchase_at: c.last_purchase_at,
               updated_at: c.updated_at }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = credit_transactions, check_for_backend(diesel::pg::Pg))]
pub struct TransactionRow {
    pub id: i64,
    pub client_id: i64,
    pub transaction_type: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub booking_id: Option<i64>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = PersistenceError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        Ok(CreditTransaction { id: r.id,
                               client_id: r.client_id,
                               transaction_type: r.transaction_type
                                                  .parse()
                                                  .map_err(|e| corrupt("credit_transactions", r.id, e))?,
                               amount: r.amount,
                               balance_before: r.balance_before,
                               balance_after: r.balance_after,
                               booking_id: r.booking_id,
                               notes: r.notes,
                               created_by: r.created_by,
                               created_at: r.created_at })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = credit_transactions)]
pub struct NewTransactionRow<'a> {
    pub client_id: i64,
    pub transaction_type: &'static str,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub booking_id: Option<i64>,
    pub notes: Option<&'a str>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewCreditTransaction> for NewTransactionRow<'a> {
    fn from(t: &'a NewCreditTransaction) -> Self {
        Self { client_id: t.client_id,
               transaction_type: t.transaction_type.as_str(),
               amount: t.amount,
               balance_before: t.balance_before,
               balance_after: t.balance_after,
               booking_id: t.booking_id,
               notes: t.notes.as_deref(),
               created_by: t.created_by,
               created_at: t.created_at }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = clients, check_for_backend(diesel::pg::Pg))]
pub struct ClientRow {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = email_outbox)]
pub struct NewOutboxRow<'a> {
    pub to_address: &'a str,
    pub subject: &'a str,
    pub html_body: &'a str,
    pub text_body: Option<&'a str>,
}
