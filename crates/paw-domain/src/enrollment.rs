//! Inscripciones de clientes en workflows y ejecuciones por step.
//!
//! Transiciones válidas de `EnrollmentStatus`:
//! - `Active` -> `Completed` (todos los steps enviados)
//! - `Active` -> `Cancelled` (acción del operador)
//!
//! Transiciones válidas de `ExecutionStatus`:
//! - `Pending` -> `Processing` (reclamada por un tick)
//! - `Processing` -> `Completed` | `Failed`
//! - `Failed` -> `Pending` (reintento manual)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(DomainError::UnknownVariant { field: "enrollment status",
                                                       value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub workflow_id: i64,
    pub client_id: i64,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
}

/// Inscripción lista para insertar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub workflow_id: i64,
    pub client_id: i64,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "processing" => Ok(ExecutionStatus::Processing),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(DomainError::UnknownVariant { field: "execution status",
                                                       value: other.to_string() }),
        }
    }
}

/// Registro por inscripción y step: cuándo toca enviarlo y qué pasó.
///
/// `step_order` es una copia del orden del step al materializar la
/// ejecución; permite ordenar y verificar predecesores aunque el step se
/// borre después.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: i64,
    pub enrollment_id: i64,
    pub step_id: i64,
    pub step_order: i32,
    pub status: ExecutionStatus,
    pub scheduled_for: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Ejecución `pending` lista para insertar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStepExecution {
    pub enrollment_id: i64,
    pub step_id: i64,
    pub step_order: i32,
    pub scheduled_for: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_roundtrip_through_column_text() {
        for s in [EnrollmentStatus::Active, EnrollmentStatus::Completed, EnrollmentStatus::Cancelled] {
            assert_eq!(s.as_str().parse::<EnrollmentStatus>().unwrap(), s);
        }
        for s in [ExecutionStatus::Pending, ExecutionStatus::Processing, ExecutionStatus::Completed, ExecutionStatus::Failed] {
            assert_eq!(s.as_str().parse::<ExecutionStatus>().unwrap(), s);
        }
        assert!("paused".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!EnrollmentStatus::Active.is_terminal());
        assert!(EnrollmentStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Processing.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }
}
