//! Ledger de créditos: saldo por cliente + historial append-only.

mod service;
mod store;

pub use service::CreditLedger;
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerUnit};

use paw_domain::CreditTransaction;

/// Verifica la cadena de un historial (ordenado por creación).
///
/// Devuelve el id de la primera transacción que rompe
/// `balance_after = balance_before + amount` o el encadenamiento con la
/// anterior. El primer `balance_before` debe ser 0.
pub fn verify_chain(history: &[CreditTransaction]) -> Result<(), i64> {
    let mut expected_before = 0;
    for tx in history {
        if tx.balance_before != expected_before || tx.balance_before.checked_add(tx.amount) != Some(tx.balance_after) {
            return Err(tx.id);
        }
        expected_before = tx.balance_after;
    }
    Ok(())
}
