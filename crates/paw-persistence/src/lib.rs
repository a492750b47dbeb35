//! paw-persistence
//!
//! Implementaciones Postgres (Diesel + r2d2) de los stores de `paw-core`,
//! más utilidades de conexión, migraciones embebidas y configuración.
//!
//! Módulos:
//! - `pg`: stores del ledger y del motor de workflows, directorio de clientes
//!   y outbox de correo.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde `.env`.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgClientDirectory, PgLedgerStore, PgOutboxMailer, PgPool,
             PgWorkflowStore, PoolProvider};
