use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Timestamptz};
use log::debug;
use paw_core::{CoreError, WorkflowStore, WorkflowUnit};
use paw_domain::{Enrollment, EnrollmentStatus, ExecutionStatus, NewEnrollment, NewStepExecution, StepDraft, StepExecution, Workflow,
                 WorkflowDraft, WorkflowStep};

use super::rows::{EnrollmentRow, ExecutionRow, NewEnrollmentRow, NewExecutionRow, NewStepRow, NewWorkflowRow, StepFieldsRow, StepRow,
                  WorkflowRow};
use super::{decode, in_transaction, track, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{workflow_enrollments, workflow_step_executions, workflow_steps, workflows};

/// Elegibilidad de despacho en una sola query: pendiente y vencida,
/// inscripción activa y ningún predecesor sin completar. Las filas que otro
/// tick tiene bloqueadas se saltan.
const LOCK_DUE_SQL: &str = "\
SELECT e.id, e.enrollment_id, e.step_id, e.step_order, e.status, e.scheduled_for,
       e.claimed_at, e.claimed_by, e.executed_at, e.error_message
  FROM workflow_step_executions e
  JOIN workflow_enrollments en ON en.id = e.enrollment_id
 WHERE e.status = 'pending'
   AND e.scheduled_for <= $1
   AND en.status = 'active'
   AND NOT EXISTS (SELECT 1
                     FROM workflow_step_executions p
                    WHERE p.enrollment_id = e.enrollment_id
                      AND p.step_order < e.step_order
                      AND p.status <> 'completed')
 ORDER BY e.scheduled_for, e.enrollment_id, e.step_order
 LIMIT $2
   FOR UPDATE OF e SKIP LOCKED";

/// Motor de workflows sobre Postgres.
#[derive(Clone)]
pub struct PgWorkflowStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgWorkflowStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

struct PgWorkflowUnit<'a> {
    conn: &'a mut PgConnection,
    failure: &'a mut Option<PersistenceError>,
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, CoreError>
    where T: TryFrom<R, Error = PersistenceError>
{
    rows.into_iter().map(decode).collect()
}

impl WorkflowUnit for PgWorkflowUnit<'_> {
    fn insert_workflow(&mut self, draft: &WorkflowDraft, now: DateTime<Utc>) -> Result<Workflow, CoreError> {
        let row = diesel::insert_into(workflows::table).values(NewWorkflowRow { name: &draft.name,
                                                                                description: &draft.description,
                                                                                active: draft.active,
                                                                                created_at: now,
                                                                                updated_at: now })
                                                       .returning(WorkflowRow::as_returning())
                                                       .get_result(self.conn);
        track(self.failure, row).map(Workflow::from)
    }

    fn lock_workflow(&mut self, workflow_id: i64) -> Result<Option<Workflow>, CoreError> {
        let row = workflows::table.find(workflow_id)
                                  .select(WorkflowRow::as_select())
                                  .for_update()
                                  .first(self.conn)
                                  .optional();
        track(self.failure, row).map(|r| r.map(Workflow::from))
    }

    fn save_workflow(&mut self, workflow: &Workflow) -> Result<(), CoreError> {
        let updated = diesel::update(workflows::table.find(workflow.id))
            .set((workflows::name.eq(&workflow.name),
                  workflows::description.eq(&workflow.description),
                  workflows::active.eq(workflow.active),
                  workflows::updated_at.eq(workflow.updated_at)))
            .execute(self.conn);
        track(self.failure, updated).map(|_| ())
    }

    fn list_workflows(&mut self) -> Result<Vec<Workflow>, CoreError> {
        let rows = workflows::table.order(workflows::id.asc())
                                   .select(WorkflowRow::as_select())
                                   .load(self.conn);
        track(self.failure, rows).map(|rs| rs.into_iter().map(Workflow::from).collect())
    }

    fn steps_of(&mut self, workflow_id: i64) -> Result<Vec<WorkflowStep>, CoreError> {
        let rows = workflow_steps::table.filter(workflow_steps::workflow_id.eq(workflow_id))
                                        .order(workflow_steps::step_order.asc())
                                        .select(StepRow::as_select())
                                        .load(self.conn);
        decode_all(track(self.failure, rows)?)
    }

    fn get_step(&mut self, step_id: i64) -> Result<Option<WorkflowStep>, CoreError> {
        let row = workflow_steps::table.find(step_id)
                                       .select(StepRow::as_select())
                                       .first(self.conn)
                                       .optional();
        track(self.failure, row)?.map(decode).transpose()
    }

    fn insert_step(&mut self,
                   workflow_id: i64,
                   step_order: i32,
                   draft: &StepDraft,
                   now: DateTime<Utc>)
                   -> Result<WorkflowStep, CoreError> {
        let row = diesel::insert_into(workflow_steps::table).values(NewStepRow { workflow_id,
                                                                                 step_order,
                                                                                 created_at: now,
                                                                                 fields: StepFieldsRow::new(draft, now) })
                                                            .returning(StepRow::as_returning())
                                                            .get_result(self.conn);
        decode(track(self.failure, row)?)
    }

    fn save_step(&mut self, step: &WorkflowStep) -> Result<(), CoreError> {
        let updated = diesel::update(workflow_steps::table.find(step.id)).set(StepFieldsRow::from_step(step))
                                                                         .execute(self.conn);
        track(self.failure, updated).map(|_| ())
    }

    fn delete_step(&mut self, step_id: i64) -> Result<(), CoreError> {
        let deleted = diesel::delete(workflow_steps::table.find(step_id)).execute(self.conn);
        track(self.failure, deleted).map(|_| ())
    }

    fn delete_pending_executions_of_step(&mut self, step_id: i64) -> Result<Vec<i64>, CoreError> {
        let deleted =
            diesel::delete(workflow_step_executions::table.filter(workflow_step_executions::step_id.eq(step_id))
                                                          .filter(workflow_step_executions::status.eq(ExecutionStatus::Pending.as_str())))
            .returning(workflow_step_executions::enrollment_id)
            .get_results::<i64>(self.conn);
        let mut affected = track(self.failure, deleted)?;
        affected.sort_unstable();
        affected.dedup();
        Ok(affected)
    }

    fn find_active_enrollment(&mut self, workflow_id: i64, client_id: i64) -> Result<Option<Enrollment>, CoreError> {
        let row = workflow_enrollments::table.filter(workflow_enrollments::workflow_id.eq(workflow_id))
                                             .filter(workflow_enrollments::client_id.eq(client_id))
                                             .filter(workflow_enrollments::status.eq(EnrollmentStatus::Active.as_str()))
                                             .select(EnrollmentRow::as_select())
                                             .for_update()
                                             .first(self.conn)
                                             .optional();
        track(self.failure, row)?.map(decode).transpose()
    }

    fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment, CoreError> {
        let row = diesel::insert_into(workflow_enrollments::table).values(NewEnrollmentRow::from(new))
                                                                  .returning(EnrollmentRow::as_returning())
                                                                  .get_result(self.conn);
        match row {
            // Índice parcial `ux_workflow_enrollments_active`: otra transacción
            // ganó la carrera entre el chequeo y el insert.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(CoreError::AlreadyEnrolled { workflow_id: new.workflow_id,
                                                 client_id: new.client_id })
            }
            other => decode(track(self.failure, other)?),
        }
    }

    fn lock_enrollment(&mut self, enrollment_id: i64) -> Result<Option<Enrollment>, CoreError> {
        let row = workflow_enrollments::table.find(enrollment_id)
                                             .select(EnrollmentRow::as_select())
                                             .for_update()
                                             .first(self.conn)
                                             .optional();
        track(self.failure, row)?.map(decode).transpose()
    }

    fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), CoreError> {
        use crate::schema::workflow_enrollments::dsl::*;
        let updated = diesel::update(workflow_enrollments.find(enrollment.id))
            .set((status.eq(enrollment.status.as_str()),
                  completed_at.eq(enrollment.completed_at),
                  cancelled_at.eq(enrollment.cancelled_at),
                  cancelled_by.eq(enrollment.cancelled_by)))
            .execute(self.conn);
        track(self.failure, updated).map(|_| ())
    }

    fn enrollments_for_client(&mut self, client_id: i64) -> Result<Vec<Enrollment>, CoreError> {
        let rows = workflow_enrollments::table.filter(workflow_enrollments::client_id.eq(client_id))
                                              .order(workflow_enrollments::id.asc())
                                              .select(EnrollmentRow::as_select())
                                              .load(self.conn);
        decode_all(track(self.failure, rows)?)
    }

    fn insert_execution(&mut self, new: &NewStepExecution) -> Result<StepExecution, CoreError> {
        let row = diesel::insert_into(workflow_step_executions::table).values(NewExecutionRow::from(new))
                                                                      .returning(ExecutionRow::as_returning())
                                                                      .get_result(self.conn);
        decode(track(self.failure, row)?)
    }

    fn executions_of(&mut self, enrollment_id: i64) -> Result<Vec<StepExecution>, CoreError> {
        let rows = workflow_step_executions::table.filter(workflow_step_executions::enrollment_id.eq(enrollment_id))
                                                  .order((workflow_step_executions::step_order.asc(),
                                                          workflow_step_executions::id.asc()))
                                                  .select(ExecutionRow::as_select())
                                                  .load(self.conn);
        decode_all(track(self.failure, rows)?)
    }

    fn lock_execution(&mut self, execution_id: i64) -> Result<Option<StepExecution>, CoreError> {
        let row = workflow_step_executions::table.find(execution_id)
                                                 .select(ExecutionRow::as_select())
                                                 .for_update()
                                                 .first(self.conn)
                                                 .optional();
        track(self.failure, row)?.map(decode).transpose()
    }

    fn save_execution(&mut self, execution: &StepExecution) -> Result<(), CoreError> {
        use crate::schema::workflow_step_executions::dsl::*;
        let updated = diesel::update(workflow_step_executions.find(execution.id))
            .set((status.eq(execution.status.as_str()),
                  scheduled_for.eq(execution.scheduled_for),
                  claimed_at.eq(execution.claimed_at),
                  claimed_by.eq(execution.claimed_by.as_deref()),
                  executed_at.eq(execution.executed_at),
                  error_message.eq(execution.error_message.as_deref())))
            .execute(self.conn);
        track(self.failure, updated).map(|_| ())
    }

    fn lock_due_executions(&mut self, now: DateTime<Utc>, limit: usize) -> Result<Vec<StepExecution>, CoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = diesel::sql_query(LOCK_DUE_SQL).bind::<Timestamptz, _>(now)
                                                  .bind::<BigInt, _>(limit)
                                                  .load::<ExecutionRow>(self.conn);
        let rows = track(self.failure, rows)?;
        debug!("lock_due_executions now={now} limit={limit} rows={}", rows.len());
        decode_all(rows)
    }

    fn lock_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> Result<Vec<StepExecution>, CoreError> {
        let rows = workflow_step_executions::table.filter(workflow_step_executions::status.eq(ExecutionStatus::Processing.as_str()))
                                                  .filter(workflow_step_executions::claimed_at.lt(claimed_before))
                                                  .order(workflow_step_executions::id.asc())
                                                  .select(ExecutionRow::as_select())
                                                  .for_update()
                                                  .skip_locked()
                                                  .load(self.conn);
        decode_all(track(self.failure, rows)?)
    }
}

impl<P: ConnectionProvider> WorkflowStore for PgWorkflowStore<P> {
    fn atomically<T, F>(&self, mut f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn WorkflowUnit) -> Result<T, CoreError>
    {
        in_transaction(&self.provider, |conn, failure| {
            let mut unit = PgWorkflowUnit { conn, failure };
            f(&mut unit)
        })
    }
}
