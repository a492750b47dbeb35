//! Cobro de créditos al crear una reserva.
//!
//! Punto de entrada del subsistema de reservas hacia el ledger. El override
//! del operador no pasa por el ledger: se devuelve `Overridden` y el llamador
//! guarda el flag en la propia reserva.

use chrono::{DateTime, Utc};
use log::warn;
use paw_domain::CreditTransaction;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ledger::{CreditLedger, LedgerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCharge {
    pub booking_id: i64,
    pub client_id: i64,
    /// Créditos que exige el tipo de cita (0 = no consume).
    pub credits_required: i64,
    pub override_credits: bool,
    pub actor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    NotRequired,
    Overridden,
    Consumed(CreditTransaction),
}

pub fn charge_booking<S: LedgerStore>(ledger: &CreditLedger<S>,
                                      charge: &BookingCharge,
                                      now: DateTime<Utc>)
                                      -> Result<ChargeOutcome, CoreError> {
    if charge.credits_required <= 0 {
        return Ok(ChargeOutcome::NotRequired);
    }
    if charge.override_credits {
        warn!("credits override booking_id={} client_id={} actor={} credits_required={}",
              charge.booking_id,
              charge.client_id,
              charge.actor,
              charge.credits_required);
        return Ok(ChargeOutcome::Overridden);
    }
    ledger.consume(charge.client_id,
                   charge.credits_required,
                   charge.booking_id,
                   Some(charge.actor),
                   now)
          .map(ChargeOutcome::Consumed)
}
