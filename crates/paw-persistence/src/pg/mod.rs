//! Implementaciones Postgres (Diesel) de los stores del core.
//!
//! Cada `atomically` del core es una transacción Postgres:
//! - las filas que el core "bloquea" se leen con `SELECT ... FOR UPDATE`;
//! - el reclamo de ejecuciones usa `FOR UPDATE SKIP LOCKED`, de modo que dos
//!   ticks concurrentes nunca ven la misma ejecución;
//! - los errores transitorios (serialización, conexión) reintentan la unidad
//!   completa con backoff corto.

mod directory;
mod ledger;
mod outbox;
pub(crate) mod rows;
mod workflow;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use paw_core::CoreError;

pub use directory::PgClientDirectory;
pub use ledger::PgLedgerStore;
pub use outbox::PgOutboxMailer;
pub use workflow::PgWorkflowStore;

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Al construirlo se corren las migraciones pendientes (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato:
/// - Debe devolver una conexión válida o `PersistenceError::TransientIo` en
///   caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// Implementación de `ConnectionProvider` respaldada por un `PgPool`.
/// Clonar comparte el pool.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl PoolProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Cubre conflictos de serialización, errores de IO del pool/conexión y
/// mensajes comunes de desconexión/deadlock que llegan como `Unknown`.
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15ms, 30ms, 45ms).
///
/// Sólo repite la unidad de trabajo provista por `f`; cada intento abre su
/// propia transacción.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Error interno de una transacción: regla de negocio del core (rollback sin
/// reintento) o fallo de base de datos (candidato a reintento).
#[derive(Debug)]
enum TxError {
    Core(CoreError),
    Db(PersistenceError),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        TxError::Db(e.into())
    }
}

/// Resultado de una query dentro de una unidad. Ante error de base de datos
/// se guarda el original en `failure` para que la transacción decida si
/// reintenta.
pub(crate) fn track<T>(failure: &mut Option<PersistenceError>, r: QueryResult<T>) -> Result<T, CoreError> {
    r.map_err(|e| {
         let pe = PersistenceError::from(e);
         let core = CoreError::Persistence(pe.to_string());
         *failure = Some(pe);
         core
     })
}

/// Convierte una fila leída a dominio; una fila corrupta no se reintenta.
pub(crate) fn decode<R, T>(row: R) -> Result<T, CoreError>
    where T: TryFrom<R, Error = PersistenceError>
{
    T::try_from(row).map_err(CoreError::from)
}

/// Corre `f` dentro de una transacción read-write con reintentos.
///
/// `f` recibe la conexión transaccional y el slot donde las queries dejan su
/// error original (ver `track`).
pub(crate) fn in_transaction<P, T, F>(provider: &P, mut f: F) -> Result<T, CoreError>
    where P: ConnectionProvider + ?Sized,
          F: FnMut(&mut PgConnection, &mut Option<PersistenceError>) -> Result<T, CoreError>
{
    let outcome = with_retry(|| {
        let mut pooled = provider.connection()?;
        let conn: &mut PgConnection = &mut pooled;
        let mut failure = None;
        let res = conn.build_transaction()
                      .read_write()
                      .run(|tx| f(tx, &mut failure).map_err(TxError::Core));
        match res {
            Ok(v) => Ok(Ok(v)),
            Err(TxError::Db(e)) => Err(e),
            Err(TxError::Core(e)) => match failure.take() {
                Some(db) => Err(db),
                None => Ok(Err(e)),
            },
        }
    });
    match outcome {
        Ok(r) => r,
        Err(e) => {
            debug!("transaction failed err={e}");
            Err(e.into())
        }
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// - Si `min_size > max_size`, usa `min_size = max_size`.
/// - Ejecuta migraciones inmediatamente con la primera conexión.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
