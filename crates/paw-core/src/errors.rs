//! Errores del core (ledger de créditos y motor de workflows).

use paw_domain::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
    #[error("adjustment requires a justification note")]
    MissingJustification,
    #[error("insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: i64, requested: i64 },
    #[error("adjustment of {amount} would leave a negative balance (current {balance})")]
    NegativeBalanceRejected { balance: i64, amount: i64 },
    #[error("client {client_id} already has an active enrollment in workflow {workflow_id}")]
    AlreadyEnrolled { workflow_id: i64, client_id: i64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("persistence: {0}")]
    Persistence(String),
}

impl CoreError {
    /// Rechazos de reglas de negocio recuperables por el llamador (override,
    /// otro monto, aviso al operador).
    pub fn is_business_rejection(&self) -> bool {
        matches!(self,
                 CoreError::InsufficientCredits { .. }
                 | CoreError::NegativeBalanceRejected { .. }
                 | CoreError::AlreadyEnrolled { .. }
                 | CoreError::InvalidTransition(_))
    }
}

impl From<DomainError> for CoreError {
    fn from(e: DomainError) -> Self {
        CoreError::Validation(e.to_string())
    }
}
