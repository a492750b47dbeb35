//! Autoría de workflows e inscripciones.

use chrono::{DateTime, Utc};
use log::{debug, info};
use paw_domain::{Enrollment, EnrollmentStatus, ExecutionStatus, NewEnrollment, NewStepExecution, StepDraft, StepExecution, Workflow,
                 WorkflowDraft, WorkflowStep};

use super::schedule::{initial_schedule, rescheduled_after};
use super::store::{WorkflowStore, WorkflowUnit};
use crate::errors::CoreError;

fn workflow_or_not_found(unit: &mut dyn WorkflowUnit, workflow_id: i64) -> Result<Workflow, CoreError> {
    unit.lock_workflow(workflow_id)?
        .ok_or_else(|| CoreError::NotFound(format!("workflow {workflow_id}")))
}

pub(crate) fn enrollment_or_not_found(unit: &mut dyn WorkflowUnit, enrollment_id: i64) -> Result<Enrollment, CoreError> {
    unit.lock_enrollment(enrollment_id)?
        .ok_or_else(|| CoreError::NotFound(format!("enrollment {enrollment_id}")))
}

pub(crate) fn execution_or_not_found(unit: &mut dyn WorkflowUnit, execution_id: i64) -> Result<StepExecution, CoreError> {
    unit.lock_execution(execution_id)?
        .ok_or_else(|| CoreError::NotFound(format!("step execution {execution_id}")))
}

/// Reevalúa una inscripción tras perder ejecuciones pendientes. Devuelve
/// `true` si quedó completada.
fn settle_after_removal(unit: &mut dyn WorkflowUnit, enrollment_id: i64, now: DateTime<Utc>) -> Result<bool, CoreError> {
    let mut enrollment = enrollment_or_not_found(unit, enrollment_id)?;
    if enrollment.status != EnrollmentStatus::Active {
        return Ok(false);
    }
    let remaining = unit.executions_of(enrollment_id)?;
    let Some(idx) = remaining.iter().position(|e| e.status != ExecutionStatus::Completed) else {
        enrollment.status = EnrollmentStatus::Completed;
        enrollment.completed_at = Some(now);
        unit.save_enrollment(&enrollment)?;
        return Ok(true);
    };
    let next = &remaining[idx];
    if next.status != ExecutionStatus::Pending {
        return Ok(false);
    }
    let base = match idx.checked_sub(1) {
        Some(prev) => match remaining[prev].executed_at {
            Some(at) => at,
            None => return Ok(false),
        },
        None => enrollment.enrolled_at,
    };
    if let Some(step) = unit.get_step(next.step_id)? {
        if let Some(at) = rescheduled_after(&step, base)? {
            if at != next.scheduled_for {
                let mut next = next.clone();
                next.scheduled_for = at;
                unit.save_execution(&next)?;
                debug!("execution rescheduled id={} scheduled_for={at}", next.id);
            }
        }
    }
    Ok(false)
}

/// Operaciones de operador sobre workflows: definición de steps,
/// inscripción, cancelación y reintento manual.
///
/// El despacho temporizado vive en `crate::dispatch`.
#[derive(Debug, Clone)]
pub struct WorkflowEngine<S: WorkflowStore> {
    store: S,
}

impl<S: WorkflowStore> WorkflowEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_workflow(&self, draft: &WorkflowDraft, now: DateTime<Utc>) -> Result<Workflow, CoreError> {
        draft.validate()?;
        let wf = self.store.atomically(|unit| unit.insert_workflow(draft, now))?;
        info!("workflow created id={} name={:?} active={}", wf.id, wf.name, wf.active);
        Ok(wf)
    }

    /// Edición de nombre, descripción y flag activo. No existe borrado: las
    /// inscripciones históricas deben seguir siendo interpretables.
    pub fn update_workflow(&self, workflow_id: i64, draft: &WorkflowDraft, now: DateTime<Utc>) -> Result<Workflow, CoreError> {
        draft.validate()?;
        self.store.atomically(|unit| {
                      let mut wf = workflow_or_not_found(unit, workflow_id)?;
                      wf.name = draft.name.clone();
                      wf.description = draft.description.clone();
                      wf.active = draft.active;
                      wf.updated_at = now;
                      unit.save_workflow(&wf)?;
                      Ok(wf)
                  })
    }

    pub fn get_workflow(&self, workflow_id: i64) -> Result<Workflow, CoreError> {
        self.store.atomically(|unit| workflow_or_not_found(unit, workflow_id))
    }

    pub fn list_workflows(&self) -> Result<Vec<Workflow>, CoreError> {
        self.store.atomically(|unit| unit.list_workflows())
    }

    pub fn steps(&self, workflow_id: i64) -> Result<Vec<WorkflowStep>, CoreError> {
        self.store.atomically(|unit| {
                      workflow_or_not_found(unit, workflow_id)?;
                      unit.steps_of(workflow_id)
                  })
    }

    /// Agrega un step al final: `step_order = max + 1` (1 si es el primero).
    /// La fila del workflow queda bloqueada para que dos altas concurrentes
    /// no reciban el mismo orden.
    pub fn add_step(&self, workflow_id: i64, draft: &StepDraft, now: DateTime<Utc>) -> Result<WorkflowStep, CoreError> {
        draft.validate()?;
        let step = self.store.atomically(|unit| {
                                 workflow_or_not_found(unit, workflow_id)?;
                                 let next_order = unit.steps_of(workflow_id)?
                                                      .iter()
                                                      .map(|s| s.step_order)
                                                      .max()
                                                      .unwrap_or(0)
                                                  + 1;
                                 unit.insert_step(workflow_id, next_order, draft, now)
                             })?;
        info!("workflow step added workflow_id={workflow_id} step_id={} order={} delay={}",
              step.id,
              step.step_order,
              step.schedule.delay_type());
        Ok(step)
    }

    /// Edita un step conservando su orden. Las ejecuciones ya materializadas
    /// no se reprograman.
    pub fn update_step(&self, step_id: i64, draft: &StepDraft, now: DateTime<Utc>) -> Result<WorkflowStep, CoreError> {
        draft.validate()?;
        self.store.atomically(|unit| {
                      let mut step = unit.get_step(step_id)?
                                         .ok_or_else(|| CoreError::NotFound(format!("workflow step {step_id}")))?;
                      workflow_or_not_found(unit, step.workflow_id)?;
                      step.apply(draft, now);
                      unit.save_step(&step)?;
                      Ok(step)
                  })
    }

    /// Borra un step sin renumerar los restantes. Sus ejecuciones pendientes
    /// se descartan; las terminales quedan como historial.
    ///
    /// Cada inscripción activa que pierde una ejecución se reevalúa en la
    /// misma unidad: se completa si ya no le queda nada por enviar, y si no,
    /// su siguiente ejecución `AfterPrevious` se recalcula desde el envío
    /// real del predecesor que queda.
    pub fn delete_step(&self, step_id: i64, now: DateTime<Utc>) -> Result<(), CoreError> {
        let (dropped, completed) = self.store.atomically(|unit| {
                                                  let step = unit.get_step(step_id)?
                                                                 .ok_or_else(|| CoreError::NotFound(format!("workflow step {step_id}")))?;
                                                  workflow_or_not_found(unit, step.workflow_id)?;
                                                  let affected = unit.delete_pending_executions_of_step(step_id)?;
                                                  unit.delete_step(step_id)?;
                                                  let mut completed = 0;
                                                  for enrollment_id in &affected {
                                                      if settle_after_removal(unit, *enrollment_id, now)? {
                                                          completed += 1;
                                                      }
                                                  }
                                                  Ok((affected.len(), completed))
                                              })?;
        info!("workflow step deleted step_id={step_id} enrollments_affected={dropped} enrollments_completed={completed}");
        Ok(())
    }

    /// Inscribe un cliente y materializa una ejecución `pending` por step.
    ///
    /// Falla con `AlreadyEnrolled` si el par ya tiene una inscripción activa
    /// y con `Validation` si el workflow está inactivo. Un workflow sin steps
    /// produce una inscripción ya `completed`.
    pub fn enroll(&self, workflow_id: i64, client_id: i64, actor: i64, now: DateTime<Utc>) -> Result<Enrollment, CoreError> {
        let enrollment = self.store.atomically(|unit| {
                                       let wf = workflow_or_not_found(unit, workflow_id)?;
                                       if !wf.active {
                                           return Err(CoreError::Validation(format!("workflow {workflow_id} is inactive")));
                                       }
                                       if unit.find_active_enrollment(workflow_id, client_id)?.is_some() {
                                           return Err(CoreError::AlreadyEnrolled { workflow_id, client_id });
                                       }
                                       let steps = unit.steps_of(workflow_id)?;
                                       let status = if steps.is_empty() {
                                           EnrollmentStatus::Completed
                                       } else {
                                           EnrollmentStatus::Active
                                       };
                                       let enrollment = unit.insert_enrollment(&NewEnrollment { workflow_id,
                                                                                                client_id,
                                                                                                status,
                                                                                                enrolled_at: now,
                                                                                                enrolled_by: actor,
                                                                                                completed_at: steps.is_empty().then_some(now) })?;
                                       for (step, at) in steps.iter().zip(initial_schedule(&steps, now)?) {
                                           let exec = unit.insert_execution(&NewStepExecution { enrollment_id: enrollment.id,
                                                                                                step_id: step.id,
                                                                                                step_order: step.step_order,
                                                                                                scheduled_for: at })?;
                                           debug!("execution materialized id={} step_id={} scheduled_for={}",
                                                  exec.id,
                                                  step.id,
                                                  exec.scheduled_for);
                                       }
                                       Ok(enrollment)
                                   })?;
        info!("enrolled client_id={client_id} workflow_id={workflow_id} enrollment_id={} actor={actor} status={}",
              enrollment.id,
              enrollment.status);
        Ok(enrollment)
    }

    /// `active -> cancelled`. Las ejecuciones pendientes quedan como están y
    /// el despachador las ignora.
    pub fn cancel(&self, enrollment_id: i64, actor: i64, now: DateTime<Utc>) -> Result<Enrollment, CoreError> {
        let enrollment = self.store.atomically(|unit| {
                                       let mut en = enrollment_or_not_found(unit, enrollment_id)?;
                                       if en.status != EnrollmentStatus::Active {
                                           return Err(CoreError::InvalidTransition(format!("enrollment {enrollment_id} is {}, only active enrollments can be cancelled",
                                                                                           en.status)));
                                       }
                                       en.status = EnrollmentStatus::Cancelled;
                                       en.cancelled_at = Some(now);
                                       en.cancelled_by = Some(actor);
                                       unit.save_enrollment(&en)?;
                                       Ok(en)
                                   })?;
        info!("enrollment cancelled id={enrollment_id} actor={actor}");
        Ok(enrollment)
    }

    /// Reintento manual de una ejecución fallida: vuelve a `pending` con
    /// vencimiento inmediato. Sólo para inscripciones activas.
    pub fn retry_execution(&self, execution_id: i64, actor: i64, now: DateTime<Utc>) -> Result<StepExecution, CoreError> {
        let exec = self.store.atomically(|unit| {
                                 let mut exec = execution_or_not_found(unit, execution_id)?;
                                 if exec.status != ExecutionStatus::Failed {
                                     return Err(CoreError::InvalidTransition(format!("execution {execution_id} is {}, only failed executions can be retried",
                                                                                     exec.status)));
                                 }
                                 let en = enrollment_or_not_found(unit, exec.enrollment_id)?;
                                 if en.status != EnrollmentStatus::Active {
                                     return Err(CoreError::InvalidTransition(format!("enrollment {} is {}", en.id, en.status)));
                                 }
                                 exec.status = ExecutionStatus::Pending;
                                 exec.scheduled_for = now;
                                 exec.claimed_at = None;
                                 exec.claimed_by = None;
                                 exec.executed_at = None;
                                 exec.error_message = None;
                                 unit.save_execution(&exec)?;
                                 Ok(exec)
                             })?;
        info!("execution requeued id={execution_id} actor={actor}");
        Ok(exec)
    }

    pub fn enrollment(&self, enrollment_id: i64) -> Result<Enrollment, CoreError> {
        self.store.atomically(|unit| enrollment_or_not_found(unit, enrollment_id))
    }

    pub fn enrollments_for_client(&self, client_id: i64) -> Result<Vec<Enrollment>, CoreError> {
        self.store.atomically(|unit| unit.enrollments_for_client(client_id))
    }

    /// Progreso de una inscripción, por `step_order`.
    pub fn executions(&self, enrollment_id: i64) -> Result<Vec<StepExecution>, CoreError> {
        self.store.atomically(|unit| {
                      enrollment_or_not_found(unit, enrollment_id)?;
                      unit.executions_of(enrollment_id)
                  })
    }
}
