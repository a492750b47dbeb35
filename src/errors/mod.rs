//! Errores de la aplicación y su traducción a códigos de salida del CLI.

mod app_error;

pub use app_error::{AppError, EXIT_INFRA, EXIT_REJECTED, EXIT_USAGE};
