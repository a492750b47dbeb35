//! Resolución de momentos de envío y elegibilidad de ejecuciones.

use chrono::{DateTime, Utc};
use paw_domain::{Delay, Enrollment, EnrollmentStatus, ExecutionStatus, StepExecution, StepSchedule, WorkflowStep};

use crate::errors::CoreError;

fn shifted(from: DateTime<Utc>, delay: Delay) -> Result<DateTime<Utc>, CoreError> {
    from.checked_add_signed(delay.as_duration())
        .ok_or_else(|| CoreError::Validation(format!("retardo '{delay}' fuera de rango desde {from}")))
}

/// Momento de envío de cada step al inscribir en `enrolled_at`.
///
/// `steps` debe venir ordenado por `step_order`. Para `AfterPrevious` se
/// guarda una estimación (momento previsto del step anterior + retardo) que
/// se reemplaza cuando el anterior se completa de verdad.
pub fn initial_schedule(steps: &[WorkflowStep], enrolled_at: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, CoreError> {
    let mut previous: Option<DateTime<Utc>> = None;
    steps.iter()
         .map(|step| {
             let at = match step.schedule {
                 StepSchedule::Immediate => enrolled_at,
                 StepSchedule::AfterEnrollment(d) => shifted(enrolled_at, d)?,
                 StepSchedule::AfterPrevious(d) => shifted(previous.unwrap_or(enrolled_at), d)?,
                 StepSchedule::SpecificDate(at) => at,
             };
             previous = Some(at);
             Ok(at)
         })
         .collect()
}

/// Nuevo momento de envío de un step tras completarse su predecesor.
/// Sólo los steps `AfterPrevious` dependen de ese momento.
pub fn rescheduled_after(step: &WorkflowStep,
                         predecessor_done_at: DateTime<Utc>)
                         -> Result<Option<DateTime<Utc>>, CoreError> {
    match step.schedule {
        StepSchedule::AfterPrevious(d) => shifted(predecessor_done_at, d).map(Some),
        _ => Ok(None),
    }
}

/// Regla de elegibilidad que aplica cualquier store al reclamar:
/// - la ejecución está `pending` y vencida (`scheduled_for <= now`);
/// - la inscripción sigue `active`;
/// - todas las ejecuciones de menor `step_order` de la misma inscripción
///   están `completed` (un predecesor `failed` detiene la secuencia hasta un
///   reintento manual).
pub fn is_dispatchable(execution: &StepExecution,
                       enrollment: &Enrollment,
                       siblings: &[StepExecution],
                       now: DateTime<Utc>)
                       -> bool {
    execution.status == ExecutionStatus::Pending
    && execution.scheduled_for <= now
    && enrollment.status == EnrollmentStatus::Active
    && siblings.iter()
               .filter(|s| s.id != execution.id && s.step_order < execution.step_order)
               .all(|s| s.status == ExecutionStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use paw_domain::{Delay, DelayUnit, StepAttachments};

    fn step(order: i32, schedule: StepSchedule) -> WorkflowStep {
        let now = Utc::now();
        WorkflowStep { id: i64::from(order),
                       workflow_id: 1,
                       step_order: order,
                       step_name: format!("s{order}"),
                       email_subject: "s".into(),
                       email_body: "b".into(),
                       email_body_text: None,
                       schedule,
                       attachments: StepAttachments::default(),
                       created_at: now,
                       updated_at: now }
    }

    #[test]
    fn resolves_every_delay_type() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let fixed = Utc.with_ymd_and_hms(2024, 2, 14, 10, 0, 0).unwrap();
        let steps = vec![step(1, StepSchedule::Immediate),
                         step(2, StepSchedule::AfterEnrollment(Delay::new(1, DelayUnit::Week))),
                         step(3, StepSchedule::AfterPrevious(Delay::new(2, DelayUnit::Hour))),
                         step(4, StepSchedule::SpecificDate(fixed)),];
        let at = initial_schedule(&steps, t).unwrap();
        assert_eq!(at[0], t);
        assert_eq!(at[1], t + Duration::days(7));
        assert_eq!(at[2], t + Duration::days(7) + Duration::hours(2));
        assert_eq!(at[3], fixed);
    }

    #[test]
    fn first_after_previous_behaves_like_after_enrollment() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let steps = vec![step(1, StepSchedule::AfterPrevious(Delay::new(30, DelayUnit::Minute)))];
        assert_eq!(initial_schedule(&steps, t).unwrap()[0], t + Duration::minutes(30));
    }

    #[test]
    fn only_after_previous_is_rescheduled() {
        let done = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let s = step(2, StepSchedule::AfterPrevious(Delay::new(3, DelayUnit::Day)));
        assert_eq!(rescheduled_after(&s, done).unwrap(), Some(Utc.with_ymd_and_hms(2024, 1, 4, 0, 5, 0).unwrap()));
        assert_eq!(rescheduled_after(&step(2, StepSchedule::Immediate), done).unwrap(), None);
    }

    #[test]
    fn out_of_range_instants_are_validation_errors() {
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let steps = vec![step(1, StepSchedule::AfterEnrollment(Delay::new(2, DelayUnit::Day)))];
        assert!(matches!(initial_schedule(&steps, late), Err(CoreError::Validation(_))));
        let s = step(2, StepSchedule::AfterPrevious(Delay::new(1, DelayUnit::Week)));
        assert!(matches!(rescheduled_after(&s, late), Err(CoreError::Validation(_))));
    }
}
