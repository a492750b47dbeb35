use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use paw_domain::{Enrollment, EnrollmentStatus, ExecutionStatus, NewEnrollment, NewStepExecution, StepDraft, StepExecution, Workflow,
                 WorkflowDraft, WorkflowStep};

use super::schedule::is_dispatchable;
use crate::errors::CoreError;

/// Operaciones disponibles dentro de una unidad atómica del motor de
/// workflows.
///
/// Los métodos `lock_*` bloquean la fila devuelta hasta el fin de la unidad.
/// Los listados devuelven siempre orden estable:
/// - steps por `step_order`;
/// - ejecuciones de una inscripción por `step_order`;
/// - ejecuciones vencidas por (`scheduled_for`, `enrollment_id`,
///   `step_order`).
pub trait WorkflowUnit {
    fn insert_workflow(&mut self, draft: &WorkflowDraft, now: DateTime<Utc>) -> Result<Workflow, CoreError>;
    fn lock_workflow(&mut self, workflow_id: i64) -> Result<Option<Workflow>, CoreError>;
    fn save_workflow(&mut self, workflow: &Workflow) -> Result<(), CoreError>;
    fn list_workflows(&mut self) -> Result<Vec<Workflow>, CoreError>;

    fn steps_of(&mut self, workflow_id: i64) -> Result<Vec<WorkflowStep>, CoreError>;
    fn get_step(&mut self, step_id: i64) -> Result<Option<WorkflowStep>, CoreError>;
    fn insert_step(&mut self,
                   workflow_id: i64,
                   step_order: i32,
                   draft: &StepDraft,
                   now: DateTime<Utc>)
                   -> Result<WorkflowStep, CoreError>;
    fn save_step(&mut self, step: &WorkflowStep) -> Result<(), CoreError>;
    fn delete_step(&mut self, step_id: i64) -> Result<(), CoreError>;
    /// Borra las ejecuciones `pending` de un step; devuelve las inscripciones
    /// afectadas, una vez cada una y en orden ascendente.
    fn delete_pending_executions_of_step(&mut self, step_id: i64) -> Result<Vec<i64>, CoreError>;

    fn find_active_enrollment(&mut self, workflow_id: i64, client_id: i64) -> Result<Option<Enrollment>, CoreError>;
    /// Debe fallar con `AlreadyEnrolled` si ya existe una inscripción activa
    /// para el par (workflow, cliente).
    fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment, CoreError>;
    fn lock_enrollment(&mut self, enrollment_id: i64) -> Result<Option<Enrollment>, CoreError>;
    fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), CoreError>;
    fn enrollments_for_client(&mut self, client_id: i64) -> Result<Vec<Enrollment>, CoreError>;

    fn insert_execution(&mut self, new: &NewStepExecution) -> Result<StepExecution, CoreError>;
    fn executions_of(&mut self, enrollment_id: i64) -> Result<Vec<StepExecution>, CoreError>;
    fn lock_execution(&mut self, execution_id: i64) -> Result<Option<StepExecution>, CoreError>;
    fn save_execution(&mut self, execution: &StepExecution) -> Result<(), CoreError>;
    /// Ejecuciones elegibles (ver `schedule::is_dispatchable`), bloqueadas y
    /// saltando las que otra unidad ya tiene bloqueadas. Como máximo `limit`.
    fn lock_due_executions(&mut self, now: DateTime<Utc>, limit: usize) -> Result<Vec<StepExecution>, CoreError>;
    /// Ejecuciones en `processing` reclamadas antes de `claimed_before`.
    fn lock_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> Result<Vec<StepExecution>, CoreError>;
}

/// Almacenamiento del motor de workflows.
pub trait WorkflowStore {
    /// Ejecuta `f` como una única transacción (todo o nada). Puede reintentar
    /// `f` ante conflictos transitorios.
    fn atomically<T, F>(&self, f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn WorkflowUnit) -> Result<T, CoreError>;
}

#[derive(Debug, Default, Clone)]
struct WorkflowState {
    workflows: BTreeMap<i64, Workflow>,
    steps: BTreeMap<i64, WorkflowStep>,
    enrollments: BTreeMap<i64, Enrollment>,
    executions: BTreeMap<i64, StepExecution>,
    last_id: i64,
}

impl WorkflowState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn executions_sorted(&self, enrollment_id: i64) -> Vec<StepExecution> {
        let mut rows: Vec<StepExecution> = self.executions
                                               .values()
                                               .filter(|e| e.enrollment_id == enrollment_id)
                                               .cloned()
                                               .collect();
        rows.sort_by_key(|e| (e.step_order, e.id));
        rows
    }
}

impl WorkflowUnit for WorkflowState {
    fn insert_workflow(&mut self, draft: &WorkflowDraft, now: DateTime<Utc>) -> Result<Workflow, CoreError> {
        let wf = Workflow { id: self.next_id(),
                            name: draft.name.clone(),
                            description: draft.description.clone(),
                            active: draft.active,
                            created_at: now,
                            updated_at: now };
        self.workflows.insert(wf.id, wf.clone());
        Ok(wf)
    }

    fn lock_workflow(&mut self, workflow_id: i64) -> Result<Option<Workflow>, CoreError> {
        Ok(self.workflows.get(&workflow_id).cloned())
    }

    fn save_workflow(&mut self, workflow: &Workflow) -> Result<(), CoreError> {
        self.workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    fn list_workflows(&mut self) -> Result<Vec<Workflow>, CoreError> {
        Ok(self.workflows.values().cloned().collect())
    }

    fn steps_of(&mut self, workflow_id: i64) -> Result<Vec<WorkflowStep>, CoreError> {
        let mut rows: Vec<WorkflowStep> = self.steps
                                              .values()
                                              .filter(|s| s.workflow_id == workflow_id)
                                              .cloned()
                                              .collect();
        rows.sort_by_key(|s| s.step_order);
        Ok(rows)
    }

    fn get_step(&mut self, step_id: i64) -> Result<Option<WorkflowStep>, CoreError> {
        Ok(self.steps.get(&step_id).cloned())
    }

    fn insert_step(&mut self,
                   workflow_id: i64,
                   step_order: i32,
                   draft: &StepDraft,
                   now: DateTime<Utc>)
                   -> Result<WorkflowStep, CoreError> {
        if self.steps.values().any(|s| s.workflow_id == workflow_id && s.step_order == step_order) {
            return Err(CoreError::Persistence(format!("duplicate step_order {step_order} in workflow {workflow_id}")));
        }
        let step = WorkflowStep { id: self.next_id(),
                                  workflow_id,
                                  step_order,
                                  step_name: draft.step_name.clone(),
                                  email_subject: draft.email_subject.clone(),
                                  email_body: draft.email_body.clone(),
                                  email_body_text: draft.email_body_text.clone(),
                                  schedule: draft.schedule,
                                  attachments: draft.attachments.clone(),
                                  created_at: now,
                                  updated_at: now };
        self.steps.insert(step.id, step.clone());
        Ok(step)
    }

    fn save_step(&mut self, step: &WorkflowStep) -> Result<(), CoreError> {
        self.steps.insert(step.id, step.clone());
        Ok(())
    }

    fn delete_step(&mut self, step_id: i64) -> Result<(), CoreError> {
        self.steps.remove(&step_id);
        Ok(())
    }

    fn delete_pending_executions_of_step(&mut self, step_id: i64) -> Result<Vec<i64>, CoreError> {
        let mut affected = Vec::new();
        self.executions.retain(|_, e| {
                           let dropped = e.step_id == step_id && e.status == ExecutionStatus::Pending;
                           if dropped {
                               affected.push(e.enrollment_id);
                           }
                           !dropped
                       });
        affected.sort_unstable();
        affected.dedup();
        Ok(affected)
    }

    fn find_active_enrollment(&mut self, workflow_id: i64, client_id: i64) -> Result<Option<Enrollment>, CoreError> {
        Ok(self.enrollments
               .values()
               .find(|e| e.workflow_id == workflow_id && e.client_id == client_id && e.status == EnrollmentStatus::Active)
               .cloned())
    }

    fn insert_enrollment(&mut self, new: &NewEnrollment) -> Result<Enrollment, CoreError> {
        if new.status == EnrollmentStatus::Active && self.find_active_enrollment(new.workflow_id, new.client_id)?.is_some() {
            return Err(CoreError::AlreadyEnrolled { workflow_id: new.workflow_id,
                                                    client_id: new.client_id });
        }
        let row = Enrollment { id: self.next_id(),
                               workflow_id: new.workflow_id,
                               client_id: new.client_id,
                               status: new.status,
                               enrolled_at: new.enrolled_at,
                               enrolled_by: new.enrolled_by,
                               completed_at: new.completed_at,
                               cancelled_at: None,
                               cancelled_by: None };
        self.enrollments.insert(row.id, row.clone());
        Ok(row)
    }

    fn lock_enrollment(&mut self, enrollment_id: i64) -> Result<Option<Enrollment>, CoreError> {
        Ok(self.enrollments.get(&enrollment_id).cloned())
    }

    fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), CoreError> {
        self.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    fn enrollments_for_client(&mut self, client_id: i64) -> Result<Vec<Enrollment>, CoreError> {
        Ok(self.enrollments
               .values()
               .filter(|e| e.client_id == client_id)
               .cloned()
               .collect())
    }

    fn insert_execution(&mut self, new: &NewStepExecution) -> Result<StepExecution, CoreError> {
        let row = StepExecution { id: self.next_id(),
                                  enrollment_id: new.enrollment_id,
                                  step_id: new.step_id,
                                  step_order: new.step_order,
                                  status: ExecutionStatus::Pending,
                                  scheduled_for: new.scheduled_for,
                                  claimed_at: None,
                                  claimed_by: None,
                                  executed_at: None,
                                  error_message: None };
        self.executions.insert(row.id, row.clone());
        Ok(row)
    }

    fn executions_of(&mut self, enrollment_id: i64) -> Result<Vec<StepExecution>, CoreError> {
        Ok(self.executions_sorted(enrollment_id))
    }

    fn lock_execution(&mut self, execution_id: i64) -> Result<Option<StepExecution>, CoreError> {
        Ok(self.executions.get(&execution_id).cloned())
    }

    fn save_execution(&mut self, execution: &StepExecution) -> Result<(), CoreError> {
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    fn lock_due_executions(&mut self, now: DateTime<Utc>, limit: usize) -> Result<Vec<StepExecution>, CoreError> {
        let mut due: Vec<StepExecution> =
            self.executions
                .values()
                .filter(|e| {
                    self.enrollments
                        .get(&e.enrollment_id)
                        .map(|en| is_dispatchable(e, en, &self.executions_sorted(e.enrollment_id), now))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
        due.sort_by_key(|e| (e.scheduled_for, e.enrollment_id, e.step_order));
        due.truncate(limit);
        Ok(due)
    }

    fn lock_stale_claims(&mut self, claimed_before: DateTime<Utc>) -> Result<Vec<StepExecution>, CoreError> {
        Ok(self.executions
               .values()
               .filter(|e| e.status == ExecutionStatus::Processing && e.claimed_at.is_some_and(|at| at < claimed_before))
               .cloned()
               .collect())
    }
}

/// Store en memoria con la misma semántica transaccional que Postgres: la
/// unidad trabaja sobre una copia que sólo se publica si `f` termina bien.
/// Clonar comparte el estado (dos "procesos" sobre la misma base).
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkflowStore {
    inner: Arc<Mutex<WorkflowState>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn atomically<T, F>(&self, mut f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn WorkflowUnit) -> Result<T, CoreError>
    {
        let mut guard = self.inner
                            .lock()
                            .map_err(|_| CoreError::Persistence("in-memory workflow store poisoned".into()))?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }
}
