use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use paw_domain::{ClientCredits, CreditTransaction, NewCreditTransaction, TransactionType};

use super::store::{LedgerStore, LedgerUnit};
use crate::errors::CoreError;

/// Reglas de negocio del ledger sobre un `LedgerStore`.
///
/// Cada operación que mueve saldo corre en una sola unidad atómica: bloqueo
/// de la fila, validación contra el saldo bloqueado, actualización de
/// totales e inserción de la transacción. Si la validación falla no se
/// escribe nada.
#[derive(Debug, Clone)]
pub struct CreditLedger<S: LedgerStore> {
    store: S,
}

/// Movimiento a registrar dentro de una unidad.
struct Movement<'a> {
    kind: TransactionType,
    amount: i64,
    booking_id: Option<i64>,
    notes: Option<&'a str>,
    actor: Option<i64>,
}

fn record(unit: &mut dyn LedgerUnit,
          credits: &mut ClientCredits,
          mv: &Movement<'_>,
          now: DateTime<Utc>)
          -> Result<CreditTransaction, CoreError> {
    let balance_before = credits.credit_balance;
    credits.apply(mv.kind, mv.amount, now)
           .map_err(|_| CoreError::InvalidAmount(mv.amount))?;
    unit.save_credits(credits)?;
    unit.append_transaction(NewCreditTransaction { client_id: credits.client_id,
                                                   transaction_type: mv.kind,
                                                   amount: mv.amount,
                                                   balance_before,
                                                   balance_after: credits.credit_balance,
                                                   booking_id: mv.booking_id,
                                                   notes: mv.notes.map(str::to_string),
                                                   created_by: mv.actor,
                                                   created_at: now })
}

impl<S: LedgerStore> CreditLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Saldo actual; crea el ledger en cero si el cliente no tenía uno.
    pub fn get_balance(&self, client_id: i64, now: DateTime<Utc>) -> Result<i64, CoreError> {
        self.ledger(client_id, now).map(|c| c.credit_balance)
    }

    /// Fila completa del ledger (crea en cero si no existe).
    pub fn ledger(&self, client_id: i64, now: DateTime<Utc>) -> Result<ClientCredits, CoreError> {
        self.store.atomically(|unit| unit.lock_credits(client_id, now))
    }

    pub fn history(&self, client_id: i64) -> Result<Vec<CreditTransaction>, CoreError> {
        self.store.transactions(client_id)
    }

    /// Consumo por reserva. Falla con `InsufficientCredits` si el saldo no
    /// alcanza; el llamador decide si ofrece el override.
    pub fn consume(&self,
                   client_id: i64,
                   amount: i64,
                   booking_id: i64,
                   actor: Option<i64>,
                   now: DateTime<Utc>)
                   -> Result<CreditTransaction, CoreError> {
        if amount <= 0 {
            return Err(CoreError::InvalidAmount(amount));
        }
        let tx = self.store.atomically(|unit| {
                               let mut credits = unit.lock_credits(client_id, now)?;
                               if credits.credit_balance < amount {
                                   return Err(CoreError::InsufficientCredits { balance: credits.credit_balance,
                                                                               requested: amount });
                               }
                               let mv = Movement { kind: TransactionType::Consume,
                                                   amount: -amount,
                                                   booking_id: Some(booking_id),
                                                   notes: None,
                                                   actor };
                               record(unit, &mut credits, &mv, now)
                           })?;
        info!("credits consume client_id={client_id} booking_id={booking_id} amount={amount} balance_after={}",
              tx.balance_after);
        Ok(tx)
    }

    /// Ajuste manual firmado. Exige nota y no permite dejar saldo negativo.
    pub fn adjust(&self,
                  client_id: i64,
                  amount: i64,
                  notes: &str,
                  actor: i64,
                  now: DateTime<Utc>)
                  -> Result<CreditTransaction, CoreError> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount(amount));
        }
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(CoreError::MissingJustification);
        }
        let tx = self.store.atomically(|unit| {
                               let mut credits = unit.lock_credits(client_id, now)?;
                               let after = credits.credit_balance
                                                  .checked_add(amount)
                                                  .ok_or(CoreError::InvalidAmount(amount))?;
                               if after < 0 {
                                   return Err(CoreError::NegativeBalanceRejected { balance: credits.credit_balance,
                                                                                   amount });
                               }
                               let mv = Movement { kind: TransactionType::Adjustment,
                                                   amount,
                                                   booking_id: None,
                                                   notes: Some(notes),
                                                   actor: Some(actor) };
                               record(unit, &mut credits, &mv, now)
                           })?;
        info!("credits adjust client_id={client_id} actor={actor} amount={amount} balance_after={}",
              tx.balance_after);
        Ok(tx)
    }

    /// Compra de paquete de créditos.
    pub fn purchase(&self,
                    client_id: i64,
                    amount: i64,
                    notes: Option<&str>,
                    actor: i64,
                    now: DateTime<Utc>)
                    -> Result<CreditTransaction, CoreError> {
        if amount <= 0 {
            return Err(CoreError::InvalidAmount(amount));
        }
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let tx = self.store.atomically(|unit| {
                               let mut credits = unit.lock_credits(client_id, now)?;
                               let mv = Movement { kind: TransactionType::Purchase,
                                                   amount,
                                                   booking_id: None,
                                                   notes,
                                                   actor: Some(actor) };
                               record(unit, &mut credits, &mv, now)
                           })?;
        info!("credits purchase client_id={client_id} actor={actor} amount={amount} balance_after={}",
              tx.balance_after);
        Ok(tx)
    }

    /// Configuración de caducidad; no genera movimiento.
    pub fn configure_expiration(&self,
                                client_id: i64,
                                expires: bool,
                                days: Option<i32>,
                                now: DateTime<Utc>)
                                -> Result<ClientCredits, CoreError> {
        if expires && !matches!(days, Some(d) if d > 0) {
            return Err(CoreError::Validation("expiration_days must be a positive number of days when credits expire".into()));
        }
        self.store.atomically(|unit| {
                      let mut credits = unit.lock_credits(client_id, now)?;
                      credits.credits_expire = expires;
                      credits.expiration_days = days;
                      credits.updated_at = now;
                      unit.save_credits(&credits)?;
                      Ok(credits)
                  })
    }

    /// Da de baja el saldo restante si la última compra superó el plazo de
    /// caducidad configurado. `None` si no corresponde caducar nada.
    pub fn expire_if_due(&self,
                         client_id: i64,
                         actor: Option<i64>,
                         now: DateTime<Utc>)
                         -> Result<Option<CreditTransaction>, CoreError> {
        let tx = self.store.atomically(|unit| {
                               let mut credits = unit.lock_credits(client_id, now)?;
                               let due_at = match (credits.credits_expire, credits.expiration_days, credits.last_purchase_at) {
                                   (true, Some(days), Some(last)) => last + Duration::days(i64::from(days)),
                                   _ => return Ok(None),
                               };
                               if credits.credit_balance <= 0 || now < due_at {
                                   return Ok(None);
                               }
                               let note = format!("credits expired after {} days", credits.expiration_days.unwrap_or_default());
                               let mv = Movement { kind: TransactionType::Expiration,
                                                   amount: -credits.credit_balance,
                                                   booking_id: None,
                                                   notes: Some(&note),
                                                   actor };
                               record(unit, &mut credits, &mv, now).map(Some)
                           })?;
        match &tx {
            Some(t) => info!("credits expired client_id={client_id} amount={}", t.amount),
            None => debug!("credits expire:noop client_id={client_id}"),
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{verify_chain, InMemoryLedgerStore};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn balance_read_creates_zero_ledger_once() {
        let ledger = CreditLedger::new(InMemoryLedgerStore::new());
        assert_eq!(ledger.get_balance(1, t0()).unwrap(), 0);
        assert_eq!(ledger.get_balance(1, t0()).unwrap(), 0);
        assert!(ledger.history(1).unwrap().is_empty());
    }

    #[test]
    fn consume_rejects_non_positive_amounts() {
        let ledger = CreditLedger::new(InMemoryLedgerStore::new());
        assert_eq!(ledger.consume(1, 0, 9, None, t0()).unwrap_err(), CoreError::InvalidAmount(0));
        assert_eq!(ledger.consume(1, -2, 9, None, t0()).unwrap_err(), CoreError::InvalidAmount(-2));
    }

    #[test]
    fn expiration_requires_positive_days() {
        let ledger = CreditLedger::new(InMemoryLedgerStore::new());
        assert!(ledger.configure_expiration(1, true, None, t0()).is_err());
        assert!(ledger.configure_expiration(1, true, Some(0), t0()).is_err());
        let c = ledger.configure_expiration(1, true, Some(30), t0()).unwrap();
        assert!(c.credits_expire);
        assert_eq!(c.expiration_days, Some(30));
        assert!(ledger.history(1).unwrap().is_empty());
    }

    #[test]
    fn expire_writes_off_remaining_balance_after_deadline() {
        let ledger = CreditLedger::new(InMemoryLedgerStore::new());
        ledger.purchase(4, 8, Some("pack 8"), 1, t0()).unwrap();
        ledger.configure_expiration(4, true, Some(30), t0()).unwrap();
        assert!(ledger.expire_if_due(4, None, t0() + Duration::days(29)).unwrap().is_none());
        let tx = ledger.expire_if_due(4, None, t0() + Duration::days(30)).unwrap().expect("debe caducar");
        assert_eq!(tx.amount, -8);
        assert_eq!(tx.balance_after, 0);
        let credits = ledger.ledger(4, t0()).unwrap();
        assert_eq!(credits.total_expired, 8);
        assert!(credits.is_consistent());
        assert!(verify_chain(&ledger.history(4).unwrap()).is_ok());
        // Sin saldo no hay nada que caducar
        assert!(ledger.expire_if_due(4, None, t0() + Duration::days(60)).unwrap().is_none());
    }
}
