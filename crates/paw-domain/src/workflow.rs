//! Definición de workflows: secuencias de emails temporizados.
//!
//! Un `Workflow` es dueño de sus `WorkflowStep`. El orden de los steps
//! (`step_order`) se asigna como `max + 1` al crearlos y nunca se renumera;
//! tras un borrado pueden quedar huecos, por lo que todo consumidor debe
//! ordenar por el valor y no asumir densidad.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Delay, DomainError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos editables de un workflow (alta y edición).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    pub description: String,
    pub active: bool,
}

impl WorkflowDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>, active: bool) -> Self {
        Self { name: name.into(),
               description: description.into(),
               active }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationError("el nombre del workflow es obligatorio".into()));
        }
        Ok(())
    }
}

/// Tipo de retardo tal como se persiste en la columna `delay_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayType {
    Immediate,
    AfterEnrollment,
    AfterPrevious,
    SpecificDate,
}

impl DelayType {
    pub fn as_str(self) -> &'static str {
        match self {
            DelayType::Immediate => "immediate",
            DelayType::AfterEnrollment => "after_enrollment",
            DelayType::AfterPrevious => "after_previous",
            DelayType::SpecificDate => "specific_date",
        }
    }
}

impl fmt::Display for DelayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelayType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "immediate" => Ok(DelayType::Immediate),
            "after_enrollment" => Ok(DelayType::AfterEnrollment),
            "after_previous" => Ok(DelayType::AfterPrevious),
            "specific_date" => Ok(DelayType::SpecificDate),
            other => Err(DomainError::UnknownVariant { field: "delay_type",
                                                       value: other.to_string() }),
        }
    }
}

/// Momento de envío de un step, ya normalizado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StepSchedule {
    Immediate,
    AfterEnrollment(Delay),
    AfterPrevious(Delay),
    SpecificDate(DateTime<Utc>),
}

impl StepSchedule {
    /// Construye el schedule a partir de las columnas/campos de formulario.
    ///
    /// `delay_value` es texto libre y sólo se exige (y parsea) para los tipos
    /// relativos; `scheduled_date` sólo para `specific_date`.
    pub fn from_parts(delay_type: DelayType,
                      delay_value: Option<&str>,
                      scheduled_date: Option<DateTime<Utc>>)
                      -> Result<Self, DomainError> {
        let parse_delay = || -> Result<Delay, DomainError> {
            match delay_value.map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => v.parse(),
                None => Err(DomainError::ValidationError(format!("delay_value es obligatorio para {delay_type}"))),
            }
        };
        match delay_type {
            DelayType::Immediate => Ok(StepSchedule::Immediate),
            DelayType::AfterEnrollment => Ok(StepSchedule::AfterEnrollment(parse_delay()?)),
            DelayType::AfterPrevious => Ok(StepSchedule::AfterPrevious(parse_delay()?)),
            DelayType::SpecificDate => scheduled_date.map(StepSchedule::SpecificDate).ok_or_else(|| {
                                                          DomainError::ValidationError("scheduled_date es obligatorio para specific_date".into())
                                                      }),
        }
    }

    pub fn delay_type(&self) -> DelayType {
        match self {
            StepSchedule::Immediate => DelayType::Immediate,
            StepSchedule::AfterEnrollment(_) => DelayType::AfterEnrollment,
            StepSchedule::AfterPrevious(_) => DelayType::AfterPrevious,
            StepSchedule::SpecificDate(_) => DelayType::SpecificDate,
        }
    }

    /// Valor normalizado para la columna `delay_value`.
    pub fn delay_value(&self) -> Option<String> {
        match self {
            StepSchedule::AfterEnrollment(d) | StepSchedule::AfterPrevious(d) => Some(d.to_string()),
            _ => None,
        }
    }

    pub fn scheduled_date(&self) -> Option<DateTime<Utc>> {
        match self {
            StepSchedule::SpecificDate(at) => Some(*at),
            _ => None,
        }
    }
}

/// Referencias opcionales que el email de un step puede incluir.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAttachments {
    pub contract_template_id: Option<i64>,
    pub form_template_id: Option<i64>,
    pub include_appointment_link: bool,
    pub appointment_type_id: Option<i64>,
}

/// Campos editables de un step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    pub step_name: String,
    pub email_subject: String,
    pub email_body: String,
    pub email_body_text: Option<String>,
    pub schedule: StepSchedule,
    pub attachments: StepAttachments,
}

impl StepDraft {
    pub fn new(step_name: impl Into<String>,
               email_subject: impl Into<String>,
               email_body: impl Into<String>,
               schedule: StepSchedule)
               -> Self {
        Self { step_name: step_name.into(),
               email_subject: email_subject.into(),
               email_body: email_body.into(),
               email_body_text: None,
               schedule,
               attachments: StepAttachments::default() }
    }

    /// Nombre, asunto y cuerpo HTML son obligatorios.
    pub fn validate(&self) -> Result<(), DomainError> {
        let missing: Vec<&str> = [("step_name", &self.step_name),
                                  ("email_subject", &self.email_subject),
                                  ("email_body", &self.email_body)].into_iter()
                                                                   .filter(|(_, v)| v.trim().is_empty())
                                                                   .map(|(k, _)| k)
                                                                   .collect();
        if !missing.is_empty() {
            return Err(DomainError::ValidationError(format!("campos obligatorios vacíos: {}", missing.join(", "))));
        }
        match &self.schedule {
            StepSchedule::AfterEnrollment(d) | StepSchedule::AfterPrevious(d) => d.validate(),
            StepSchedule::Immediate | StepSchedule::SpecificDate(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i32,
    pub step_name: String,
    pub email_subject: String,
    pub email_body: String,
    pub email_body_text: Option<String>,
    pub schedule: StepSchedule,
    pub attachments: StepAttachments,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStep {
    /// Aplica un draft ya validado conservando id, workflow y orden.
    pub fn apply(&mut self, draft: &StepDraft, now: DateTime<Utc>) {
        self.step_name = draft.step_name.clone();
        self.email_subject = draft.email_subject.clone();
        self.email_body = draft.email_body.clone();
        self.email_body_text = draft.email_body_text.clone();
        self.schedule = draft.schedule;
        self.attachments = draft.attachments.clone();
        self.updated_at = now;
    }
}
