use thiserror::Error;

/// Errores del dominio: validación de datos de entrada y parseo de valores
/// persistidos como texto.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Error de validación: {0}")]
    ValidationError(String),

    #[error("Valor desconocido para {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },
}
