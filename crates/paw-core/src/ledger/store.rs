use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use paw_domain::{ClientCredits, CreditTransaction, NewCreditTransaction};

use crate::errors::CoreError;

/// Operaciones disponibles dentro de una unidad atómica del ledger.
///
/// Contrato:
/// - `lock_credits` bloquea la fila del cliente hasta el fin de la unidad
///   (creándola con saldo cero si no existe). Dos unidades concurrentes sobre
///   el mismo cliente se serializan.
/// - Todo cambio de saldo debe ir acompañado de exactamente un
///   `append_transaction` en la misma unidad.
pub trait LedgerUnit {
    fn lock_credits(&mut self, client_id: i64, now: DateTime<Utc>) -> Result<ClientCredits, CoreError>;
    fn save_credits(&mut self, credits: &ClientCredits) -> Result<(), CoreError>;
    fn append_transaction(&mut self, tx: NewCreditTransaction) -> Result<CreditTransaction, CoreError>;
}

/// Almacenamiento del ledger.
pub trait LedgerStore {
    /// Ejecuta `f` como una única transacción: si devuelve `Err` no queda
    /// ningún cambio. Puede reintentar `f` ante conflictos transitorios.
    fn atomically<T, F>(&self, f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn LedgerUnit) -> Result<T, CoreError>;

    /// Historial del cliente en orden de creación (id ascendente).
    fn transactions(&self, client_id: i64) -> Result<Vec<CreditTransaction>, CoreError>;
}

#[derive(Debug, Default, Clone)]
struct LedgerState {
    credits: HashMap<i64, ClientCredits>,
    transactions: Vec<CreditTransaction>,
    last_id: i64,
}

impl LedgerUnit for LedgerState {
    fn lock_credits(&mut self, client_id: i64, now: DateTime<Utc>) -> Result<ClientCredits, CoreError> {
        Ok(self.credits
               .entry(client_id)
               .or_insert_with(|| ClientCredits::empty(client_id, now))
               .clone())
    }

    fn save_credits(&mut self, credits: &ClientCredits) -> Result<(), CoreError> {
        self.credits.insert(credits.client_id, credits.clone());
        Ok(())
    }

    fn append_transaction(&mut self, tx: NewCreditTransaction) -> Result<CreditTransaction, CoreError> {
        self.last_id += 1;
        let row = tx.with_id(self.last_id);
        self.transactions.push(row.clone());
        Ok(row)
    }
}

/// Ledger en memoria. Clonar comparte el mismo estado (útil para simular
/// varios procesos sobre la misma base en tests).
///
/// La unidad atómica trabaja sobre una copia del estado que sólo se publica
/// si `f` termina bien, con el mutex tomado durante toda la unidad.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn atomically<T, F>(&self, mut f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn LedgerUnit) -> Result<T, CoreError>
    {
        let mut guard = self.inner
                            .lock()
                            .map_err(|_| CoreError::Persistence("in-memory ledger poisoned".into()))?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    fn transactions(&self, client_id: i64) -> Result<Vec<CreditTransaction>, CoreError> {
        let guard = self.inner
                        .lock()
                        .map_err(|_| CoreError::Persistence("in-memory ledger poisoned".into()))?;
        Ok(guard.transactions
                .iter()
                .filter(|t| t.client_id == client_id)
                .cloned()
                .collect())
    }
}
