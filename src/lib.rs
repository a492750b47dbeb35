//! Pawflow
//!
//! Este crate arma la aplicación sobre los crates del workspace:
//! - `config`: variables de entorno y `.env`.
//! - `errors`: `AppError` y códigos de salida.
//! - `cli`: comandos de `pawflow` (clap).
//! - `app`: cableado de engine, ledger y despachador, y ejecución de comandos.
//!
//! Puede usarse desde `main.rs` o desde tests con stores en memoria.

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;

pub use app::{connect, App, Output, PgApp};
pub use cli::Cli;
pub use config::AppConfig;
pub use errors::AppError;
