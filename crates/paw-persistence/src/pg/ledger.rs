use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use paw_core::{CoreError, LedgerStore, LedgerUnit};
use paw_domain::{ClientCredits, CreditTransaction, NewCreditTransaction};

use super::rows::{CreditsRow, NewTransactionRow, TransactionRow};
use super::{decode, in_transaction, track, with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{client_credits, credit_transactions};

/// Ledger de créditos sobre Postgres.
///
/// La fila de `client_credits` se crea perezosamente con
/// `INSERT ... ON CONFLICT DO NOTHING` y se bloquea con `FOR UPDATE`; las
/// operaciones concurrentes sobre el mismo cliente se serializan ahí.
#[derive(Clone)]
pub struct PgLedgerStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgLedgerStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

struct PgLedgerUnit<'a> {
    conn: &'a mut PgConnection,
    failure: &'a mut Option<PersistenceError>,
}

impl LedgerUnit for PgLedgerUnit<'_> {
    fn lock_credits(&mut self, client_id: i64, now: DateTime<Utc>) -> Result<ClientCredits, CoreError> {
        let seed = CreditsRow::from(&ClientCredits::empty(client_id, now));
        let created = diesel::insert_into(client_credits::table).values(&seed)
                                                                 .on_conflict_do_nothing()
                                                                 .execute(self.conn);
        if track(self.failure, created)? > 0 {
            debug!("client_credits created client_id={client_id}");
        }
        let row = client_credits::table.find(client_id)
                                       .select(CreditsRow::as_select())
                                       .for_update()
                                       .first(self.conn);
        track(self.failure, row).map(ClientCredits::from)
    }

    fn save_credits(&mut self, credits: &ClientCredits) -> Result<(), CoreError> {
        use crate::schema::client_credits::dsl::*;
        let updated = diesel::update(client_credits.find(credits.client_id))
            .set((credit_balance.eq(credits.credit_balance),
                  total_purchased.eq(credits.total_purchased),
                  total_consumed.eq(credits.total_consumed),
                  total_adjusted.eq(credits.total_adjusted),
                  total_expired.eq(credits.total_expired),
                  credits_expire.eq(credits.credits_expire),
                  expiration_days.eq(credits.expiration_days),
                  last_purchase_at.eq(credits.last_purchase_at),
                  updated_at.eq(credits.updated_at)))
            .execute(self.conn);
        track(self.failure, updated).map(|_| ())
    }

    fn append_transaction(&mut self, tx: NewCreditTransaction) -> Result<CreditTransaction, CoreError> {
        let row = diesel::insert_into(credit_transactions::table).values(NewTransactionRow::from(&tx))
                                                                  .returning(TransactionRow::as_returning())
                                                                  .get_result(self.conn);
        decode(track(self.failure, row)?)
    }
}

impl<P: ConnectionProvider> LedgerStore for PgLedgerStore<P> {
    fn atomically<T, F>(&self, mut f: F) -> Result<T, CoreError>
        where F: FnMut(&mut dyn LedgerUnit) -> Result<T, CoreError>
    {
        in_transaction(&self.provider, |conn, failure| {
            let mut unit = PgLedgerUnit { conn, failure };
            f(&mut unit)
        })
    }

    fn transactions(&self, client_id: i64) -> Result<Vec<CreditTransaction>, CoreError> {
        debug!("transactions:start client_id={client_id}");
        let rows: Vec<TransactionRow> = with_retry(|| {
                                            let mut conn = self.provider.connection()?;
                                            credit_transactions::table.filter(credit_transactions::client_id.eq(client_id))
                                                                      .order(credit_transactions::id.asc())
                                                                      .select(TransactionRow::as_select())
                                                                      .load(&mut conn)
                                                                      .map_err(PersistenceError::from)
                                        })?;
        rows.into_iter().map(decode).collect()
    }
}
