//! Ledger de créditos por cliente: saldo + historial append-only.
//!
//! Invariante del saldo:
//! `credit_balance = total_purchased - total_consumed + total_adjusted - total_expired`
//!
//! Invariante de la cadena de transacciones (por cliente, orden de creación):
//! - `balance_after = balance_before + amount`
//! - `balance_before` de cada fila = `balance_after` de la fila anterior.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Consume,
    Adjustment,
    Expiration,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Consume => "consume",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Expiration => "expiration",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionType::Purchase),
            "consume" => Ok(TransactionType::Consume),
            "adjustment" => Ok(TransactionType::Adjustment),
            "expiration" => Ok(TransactionType::Expiration),
            other => Err(DomainError::UnknownVariant { field: "transaction_type",
                                                       value: other.to_string() }),
        }
    }
}

/// Fila 1:1 con el cliente. Se crea perezosamente con saldo cero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredits {
    pub client_id: i64,
    pub credit_balance: i64,
    pub total_purchased: i64,
    pub total_consumed: i64,
    pub total_adjusted: i64,
    pub total_expired: i64,
    pub credits_expire: bool,
    pub expiration_days: Option<i32>,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ClientCredits {
    pub fn empty(client_id: i64, now: DateTime<Utc>) -> Self {
        Self { client_id,
               credit_balance: 0,
               total_purchased: 0,
               total_consumed: 0,
               total_adjusted: 0,
               total_expired: 0,
               credits_expire: false,
               expiration_days: None,
               last_purchase_at: None,
               updated_at: now }
    }

    /// Saldo derivado de los totales, en i128 para que la suma intermedia no
    /// desborde.
    pub fn derived_balance(&self) -> i128 {
        i128::from(self.total_purchased) - i128::from(self.total_consumed) + i128::from(self.total_adjusted)
        - i128::from(self.total_expired)
    }

    pub fn is_consistent(&self) -> bool {
        i128::from(self.credit_balance) == self.derived_balance()
    }

    /// Aplica un movimiento a saldo y totales. No valida reglas de negocio.
    ///
    /// Si el saldo o el total afectado desbordaría i64 no toca nada y
    /// devuelve `ValidationError`.
    pub fn apply(&mut self, kind: TransactionType, amount: i64, now: DateTime<Utc>) -> Result<(), DomainError> {
        let client_id = self.client_id;
        let overflow = move || DomainError::ValidationError(format!("movimiento {kind} de {amount} desborda el ledger del cliente {client_id}"));
        let balance = self.credit_balance.checked_add(amount).ok_or_else(overflow)?;
        let total = match kind {
            TransactionType::Purchase => &mut self.total_purchased,
            TransactionType::Consume => &mut self.total_consumed,
            TransactionType::Adjustment => &mut self.total_adjusted,
            TransactionType::Expiration => &mut self.total_expired,
        };
        // Consumos y caducidades llegan con signo negativo; su total es positivo.
        let next = match kind {
            TransactionType::Consume | TransactionType::Expiration => total.checked_sub(amount),
            TransactionType::Purchase | TransactionType::Adjustment => total.checked_add(amount),
        };
        *total = next.ok_or_else(overflow)?;
        self.credit_balance = balance;
        if kind == TransactionType::Purchase {
            self.last_purchase_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: i64,
    pub client_id: i64,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub booking_id: Option<i64>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Transacción lista para insertar (sin id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCreditTransaction {
    pub client_id: i64,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub booking_id: Option<i64>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewCreditTransaction {
    pub fn with_id(self, id: i64) -> CreditTransaction {
        CreditTransaction { id,
                            client_id: self.client_id,
                            transaction_type: self.transaction_type,
                            amount: self.amount,
                            balance_before: self.balance_before,
                            balance_after: self.balance_after,
                            booking_id: self.booking_id,
                            notes: self.notes,
                            created_by: self.created_by,
                            created_at: self.created_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_totals_consistent() {
        let now = Utc::now();
        let mut c = ClientCredits::empty(7, now);
        c.apply(TransactionType::Purchase, 10, now).unwrap();
        c.apply(TransactionType::Consume, -3, now).unwrap();
        c.apply(TransactionType::Adjustment, 2, now).unwrap();
        c.apply(TransactionType::Adjustment, -1, now).unwrap();
        c.apply(TransactionType::Expiration, -8, now).unwrap();
        assert_eq!(c.credit_balance, 0);
        assert_eq!(c.total_purchased, 10);
        assert_eq!(c.total_consumed, 3);
        assert_eq!(c.total_adjusted, 1);
        assert_eq!(c.total_expired, 8);
        assert!(c.is_consistent());
        assert_eq!(c.last_purchase_at, Some(now));
    }

    #[test]
    fn apply_leaves_the_row_untouched_on_overflow() {
        let now = Utc::now();
        let mut c = ClientCredits::empty(7, now);
        c.apply(TransactionType::Adjustment, i64::MAX, now).unwrap();
        let before = c.clone();
        assert!(matches!(c.apply(TransactionType::Purchase, 1, now), Err(DomainError::ValidationError(_))));
        assert_eq!(c, before);
        assert!(c.is_consistent());
    }
}
