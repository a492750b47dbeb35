use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use paw_domain::{Enrollment, EnrollmentStatus, ExecutionStatus, StepExecution, Workflow, WorkflowStep};
use uuid::Uuid;

use super::{DispatchConfig, DispatcherBuilder, TickReport};
use crate::collab::{ClientDirectory, EmailSender, LinkBuilder, NoLinks, OutgoingEmail, PlaceholderRenderer, RenderContext,
                    ShareTarget, TemplateRenderer};
use crate::errors::CoreError;
use crate::workflow::schedule::rescheduled_after;
use crate::workflow::{enrollment_or_not_found, execution_or_not_found, WorkflowStore, WorkflowUnit};

const CLAIM_EXPIRED: &str = "claim expired";

/// Resultado de cerrar una ejecución reclamada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    /// La ejecución quedó en su estado final; `true` si además se completó la
    /// inscripción.
    Recorded(bool),
    /// El reclamo ya no es nuestro (expiró mientras enviábamos).
    ClaimLost,
}

#[derive(Debug)]
pub struct Dispatcher<S, M, D, R = PlaceholderRenderer, L = NoLinks> {
    store: S,
    mailer: M,
    directory: D,
    renderer: R,
    links: L,
    config: DispatchConfig,
}

impl<S, M, D> Dispatcher<S, M, D>
    where S: WorkflowStore,
          M: EmailSender,
          D: ClientDirectory
{
    pub fn builder(store: S, mailer: M, directory: D) -> DispatcherBuilder<S, M, D> {
        DispatcherBuilder { store,
                            mailer,
                            directory,
                            renderer: PlaceholderRenderer,
                            links: NoLinks,
                            config: DispatchConfig::default() }
    }
}

impl<S, M, D, R, L> Dispatcher<S, M, D, R, L>
    where S: WorkflowStore,
          M: EmailSender,
          D: ClientDirectory,
          R: TemplateRenderer,
          L: LinkBuilder
{
    pub(super) fn from_builder(b: DispatcherBuilder<S, M, D, R, L>) -> Self {
        Self { store: b.store,
               mailer: b.mailer,
               directory: b.directory,
               renderer: b.renderer,
               links: b.links,
               config: b.config }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Un ciclo completo de despacho al instante `now`.
    ///
    /// Reclama por rondas hasta agotar lo elegible o `batch_size`: un step
    /// inmediato que queda habilitado al completarse su predecesor sale en el
    /// mismo tick.
    ///
    /// Los fallos de entrega o de render quedan registrados en la ejecución y
    /// no interrumpen el tick. Sólo un error de persistencia lo aborta; las
    /// ejecuciones ya reclamadas quedan en `processing` y el siguiente tick las
    /// expira pasado `claim_timeout`.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, CoreError> {
        let tick_id = Uuid::new_v4();
        let mut report = TickReport::new(tick_id);
        debug!("tick:start tick_id={tick_id} now={now}");

        report.expired_claims = self.expire_stale_claims(now)?;

        let mut rounds = 0;
        while report.claimed < self.config.batch_size {
            let claimed = self.claim(tick_id, now, self.config.batch_size - report.claimed)?;
            if claimed.is_empty() {
                break;
            }
            rounds += 1;
            report.claimed += claimed.len();
            for exec in &claimed {
                self.dispatch_one(tick_id, exec, now, &mut report)?;
            }
        }

        info!("tick:done tick_id={tick_id} rounds={rounds} expired={} claimed={} completed={} failed={} enrollments_completed={}",
              report.expired_claims,
              report.claimed,
              report.completed,
              report.failed,
              report.enrollments_completed);
        Ok(report)
    }

    fn dispatch_one(&self, tick_id: Uuid, exec: &StepExecution, now: DateTime<Utc>, report: &mut TickReport) -> Result<(), CoreError> {
        let outcome = match self.compose(exec) {
            Ok(email) => self.mailer.send(&email).map_err(|e| e.to_string()),
            Err(e @ CoreError::Persistence(_)) => {
                error!("tick:abort tick_id={tick_id} execution_id={} err={e}", exec.id);
                return Err(e);
            }
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(()) => match self.complete(exec, now)? {
                Closed::Recorded(enrollment_done) => {
                    report.completed += 1;
                    if enrollment_done {
                        report.enrollments_completed += 1;
                    }
                }
                Closed::ClaimLost => {}
            },
            Err(msg) => {
                warn!("execution failed id={} enrollment_id={} step_id={} err={msg}",
                      exec.id,
                      exec.enrollment_id,
                      exec.step_id);
                if let Closed::Recorded(_) = self.fail(exec, &msg, now)? {
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    fn expire_stale_claims(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let cutoff = now - self.config.claim_timeout;
        let expired = self.store.atomically(|unit| {
                                    let stale = unit.lock_stale_claims(cutoff)?;
                                    for mut exec in stale.iter().cloned() {
                                        exec.status = ExecutionStatus::Failed;
                                        exec.executed_at = Some(now);
                                        exec.error_message = Some(CLAIM_EXPIRED.to_string());
                                        unit.save_execution(&exec)?;
                                    }
                                    Ok(stale)
                                })?;
        for exec in &expired {
            warn!("claim expired execution_id={} claimed_by={:?} claimed_at={:?}",
                  exec.id,
                  exec.claimed_by,
                  exec.claimed_at);
        }
        Ok(expired.len())
    }

    /// Lee elegibilidad y marca `processing` en la misma transacción.
    fn claim(&self, tick_id: Uuid, now: DateTime<Utc>, limit: usize) -> Result<Vec<StepExecution>, CoreError> {
        let claimed_by = tick_id.to_string();
        self.store.atomically(|unit| {
                      let mut due = unit.lock_due_executions(now, limit)?;
                      for exec in due.iter_mut() {
                          exec.status = ExecutionStatus::Processing;
                          exec.claimed_at = Some(now);
                          exec.claimed_by = Some(claimed_by.clone());
                          unit.save_execution(exec)?;
                      }
                      Ok(due)
                  })
    }

    fn load(&self, exec: &StepExecution) -> Result<(WorkflowStep, Enrollment, Workflow), CoreError> {
        self.store.atomically(|unit| {
                      let step = unit.get_step(exec.step_id)?
                                     .ok_or_else(|| CoreError::NotFound(format!("workflow step {}", exec.step_id)))?;
                      let enrollment = enrollment_or_not_found(unit, exec.enrollment_id)?;
                      let workflow = unit.lock_workflow(enrollment.workflow_id)?
                                         .ok_or_else(|| CoreError::NotFound(format!("workflow {}", enrollment.workflow_id)))?;
                      Ok((step, enrollment, workflow))
                  })
    }

    /// Arma el correo de una ejecución. Cualquier error que no sea de
    /// persistencia es un fallo del step.
    fn compose(&self, exec: &StepExecution) -> Result<OutgoingEmail, CoreError> {
        let (step, enrollment, workflow) = self.load(exec)?;
        let contact = self.directory
                          .contact(enrollment.client_id)?
                          .ok_or_else(|| CoreError::NotFound(format!("client {}", enrollment.client_id)))?;
        if contact.email.trim().is_empty() {
            return Err(CoreError::Validation(format!("client {} has no email address", contact.client_id)));
        }

        let attachments = &step.attachments;
        let link = |target: ShareTarget| self.links.share_link(target, contact.client_id);
        let ctx = RenderContext { client_name: contact.name.clone(),
                                  workflow_name: workflow.name.clone(),
                                  step_name: step.step_name.clone(),
                                  contract_link: attachments.contract_template_id
                                                            .map(|id| link(ShareTarget::Contract(id)))
                                                            .transpose()?,
                                  form_link: attachments.form_template_id
                                                        .map(|id| link(ShareTarget::Form(id)))
                                                        .transpose()?,
                                  booking_link: if attachments.include_appointment_link {
                                      Some(link(ShareTarget::Booking { appointment_type_id: attachments.appointment_type_id })?)
                                  } else {
                                      None
                                  } };

        let subject = self.renderer.render(&step.email_subject, &ctx)?;
        let mut html_body = self.renderer.render(&step.email_body, &ctx)?;
        let mut text_body = step.email_body_text
                                .as_deref()
                                .map(|t| self.renderer.render(t, &ctx))
                                .transpose()?;
        append_missing_links(&step, &ctx, &mut html_body, text_body.as_mut());

        debug!("execution composed id={} to={} subject={subject:?}", exec.id, contact.email);
        Ok(OutgoingEmail { to: contact.email,
                           subject,
                           html_body,
                           text_body })
    }

    fn complete(&self, exec: &StepExecution, now: DateTime<Utc>) -> Result<Closed, CoreError> {
        let closed = self.store.atomically(|unit| {
                                   let Some(mut current) = still_claimed(unit, exec)? else {
                                       return Ok(Closed::ClaimLost);
                                   };
                                   current.status = ExecutionStatus::Completed;
                                   current.executed_at = Some(now);
                                   current.error_message = None;
                                   unit.save_execution(&current)?;

                                   let siblings = unit.executions_of(current.enrollment_id)?;
                                   if let Some(next) = siblings.iter()
                                                               .find(|s| s.step_order > current.step_order)
                                                               .filter(|s| s.status == ExecutionStatus::Pending)
                                   {
                                       if let Some(step) = unit.get_step(next.step_id)? {
                                           if let Some(at) = rescheduled_after(&step, now)? {
                                               let mut next = next.clone();
                                               next.scheduled_for = at;
                                               unit.save_execution(&next)?;
                                               debug!("execution rescheduled id={} scheduled_for={at}", next.id);
                                           }
                                       }
                                   }

                                   if !siblings.iter().all(|s| s.status == ExecutionStatus::Completed) {
                                       return Ok(Closed::Recorded(false));
                                   }
                                   let mut enrollment = enrollment_or_not_found(unit, current.enrollment_id)?;
                                   if enrollment.status != EnrollmentStatus::Active {
                                       return Ok(Closed::Recorded(false));
                                   }
                                   enrollment.status = EnrollmentStatus::Completed;
                                   enrollment.completed_at = Some(now);
                                   unit.save_enrollment(&enrollment)?;
                                   Ok(Closed::Recorded(true))
                               })?;
        match closed {
            Closed::Recorded(true) => info!("enrollment completed id={}", exec.enrollment_id),
            Closed::ClaimLost => warn!("execution sent after its claim was lost id={}", exec.id),
            Closed::Recorded(false) => {}
        }
        Ok(closed)
    }

    fn fail(&self, exec: &StepExecution, message: &str, now: DateTime<Utc>) -> Result<Closed, CoreError> {
        self.store.atomically(|unit| {
                      let Some(mut current) = still_claimed(unit, exec)? else {
                          return Ok(Closed::ClaimLost);
                      };
                      current.status = ExecutionStatus::Failed;
                      current.executed_at = Some(now);
                      current.error_message = Some(message.to_string());
                      unit.save_execution(&current)?;
                      Ok(Closed::Recorded(false))
                  })
    }
}

/// Relee la ejecución bloqueada y la devuelve sólo si sigue reclamada por el
/// mismo tick.
fn still_claimed(unit: &mut dyn WorkflowUnit, exec: &StepExecution) -> Result<Option<StepExecution>, CoreError> {
    let current = execution_or_not_found(unit, exec.id)?;
    if current.status == ExecutionStatus::Processing && current.claimed_by == exec.claimed_by {
        Ok(Some(current))
    } else {
        Ok(None)
    }
}

/// Los links pedidos por el step que la plantilla no menciona se agregan al
/// final del cuerpo.
fn append_missing_links(step: &WorkflowStep, ctx: &RenderContext, html: &mut String, mut text: Option<&mut String>) {
    let wanted = [("contract_link", "Sign your contract", ctx.contract_link.as_deref()),
                  ("form_link", "Complete your form", ctx.form_link.as_deref()),
                  ("booking_link", "Book your appointment", ctx.booking_link.as_deref())];
    for (key, label, url) in wanted {
        let Some(url) = url else { continue };
        let placeholder = format!("{{{key}}}");
        if !step.email_body.contains(&placeholder) {
            html.push_str(&format!("\n<p><a href=\"{url}\">{label}</a></p>"));
        }
        let text_mentions = step.email_body_text
                                .as_deref()
                                .is_some_and(|t| t.contains(&placeholder));
        if let Some(t) = text.as_mut() {
            if !text_mentions {
                t.push_str(&format!("\n\n{label}: {url}"));
            }
        }
    }
}
