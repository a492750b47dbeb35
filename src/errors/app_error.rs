use paw_core::CoreError;
use paw_domain::DomainError;
use paw_persistence::PersistenceError;
use thiserror::Error;

/// Uso incorrecto, configuración inválida o datos que no validan.
pub const EXIT_USAGE: i32 = 2;
/// Regla de negocio rechazó la operación (saldo, estado, inexistente).
pub const EXIT_REJECTED: i32 = 4;
/// Base de datos, pool o serialización de salida.
pub const EXIT_INFRA: i32 = 5;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Error de salida: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Core(e.into())
    }
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => EXIT_USAGE,
            AppError::Core(e) if e.is_business_rejection() => EXIT_REJECTED,
            AppError::Core(CoreError::NotFound(_)) => EXIT_REJECTED,
            AppError::Core(CoreError::Persistence(_)) => EXIT_INFRA,
            AppError::Core(_) => EXIT_USAGE,
            AppError::Persistence(PersistenceError::Config(_)) => EXIT_USAGE,
            AppError::Persistence(_) => EXIT_INFRA,
            AppError::Output(_) => EXIT_INFRA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_variant_format() {
        let err = AppError::Config("mala configuración".into());
        assert_eq!(err.to_string(), "Error de configuración: mala configuración");
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_core_errors_keep_their_message() {
        let err = AppError::from(CoreError::InsufficientCredits { balance: 1, requested: 3 });
        assert_eq!(err.to_string(), "insufficient credits: balance 1, requested 3");
    }

    #[test]
    fn test_exit_codes_by_kind() {
        assert_eq!(AppError::from(CoreError::Validation("x".into())).exit_code(), EXIT_USAGE);
        assert_eq!(AppError::from(CoreError::MissingJustification).exit_code(), EXIT_USAGE);
        assert_eq!(AppError::from(CoreError::AlreadyEnrolled { workflow_id: 1,
                                                               client_id: 2 }).exit_code(),
                   EXIT_REJECTED);
        assert_eq!(AppError::from(CoreError::NotFound("workflow 9".into())).exit_code(), EXIT_REJECTED);
        assert_eq!(AppError::from(CoreError::Persistence("down".into())).exit_code(), EXIT_INFRA);
        assert_eq!(AppError::from(PersistenceError::TransientIo("pool".into())).exit_code(), EXIT_INFRA);
        assert_eq!(AppError::from(PersistenceError::Config("DATABASE_URL no definido".into())).exit_code(),
                   EXIT_USAGE);
    }

    #[test]
    fn test_domain_errors_are_validation() {
        let err = AppError::from(DomainError::ValidationError("nombre vacío".into()));
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }
}
