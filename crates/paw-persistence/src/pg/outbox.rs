use diesel::prelude::*;
use log::debug;
use paw_core::{DeliveryError, EmailSender, OutgoingEmail};

use super::rows::NewOutboxRow;
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::email_outbox;

/// Entrega "durable": deja el correo en `email_outbox` para que un relay
/// externo lo envíe. El despachador lo considera enviado al insertarse.
#[derive(Clone)]
pub struct PgOutboxMailer<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgOutboxMailer<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EmailSender for PgOutboxMailer<P> {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let id: i64 = with_retry(|| {
                          let mut conn = self.provider.connection()?;
                          diesel::insert_into(email_outbox::table).values(NewOutboxRow { to_address: &email.to,
                                                                                         subject: &email.subject,
                                                                                         html_body: &email.html_body,
                                                                                         text_body: email.text_body.as_deref() })
                                                                  .returning(email_outbox::id)
                                                                  .get_result(&mut conn)
                                                                  .map_err(PersistenceError::from)
                      }).map_err(|e| DeliveryError(format!("outbox insert: {e}")))?;
        debug!("outbox queued id={id} to={}", email.to);
        Ok(())
    }
}
