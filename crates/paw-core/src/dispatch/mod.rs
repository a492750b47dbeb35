//! Despachador de steps: cada `tick` envía los correos vencidos.
//!
//! Un tick pasa por cinco etapas:
//! 1. expira reclamos viejos (`processing` más allá de `claim_timeout`);
//! 2. reclama, en una transacción, las ejecuciones elegibles;
//! 3. arma y envía cada correo;
//! 4. éxito: `completed`, reprograma el sucesor `after_previous` y cierra la
//!    inscripción si ya no queda nada;
//! 5. fallo: `failed` con el mensaje, sin reintento automático.

mod builder;
mod tick;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use builder::DispatcherBuilder;
pub use tick::Dispatcher;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_CLAIM_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Máximo de ejecuciones reclamadas por tick.
    pub batch_size: usize,
    /// Antigüedad a partir de la cual un reclamo se considera abandonado.
    pub claim_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE,
               claim_timeout: Duration::minutes(DEFAULT_CLAIM_TIMEOUT_MINUTES) }
    }
}

/// Resumen de un tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick_id: Uuid,
    pub expired_claims: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub enrollments_completed: usize,
}

impl TickReport {
    fn new(tick_id: Uuid) -> Self {
        Self { tick_id,
               expired_claims: 0,
               claimed: 0,
               completed: 0,
               failed: 0,
               enrollments_completed: 0 }
    }
}
