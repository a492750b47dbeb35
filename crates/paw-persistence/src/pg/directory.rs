use diesel::prelude::*;
use paw_core::{ClientDirectory, CoreError};
use paw_domain::ClientContact;

use super::rows::ClientRow;
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::clients;

/// Lee nombre y email desde la tabla `clients` de la aplicación.
#[derive(Clone)]
pub struct PgClientDirectory<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgClientDirectory<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> ClientDirectory for PgClientDirectory<P> {
    fn contact(&self, client_id: i64) -> Result<Option<ClientContact>, CoreError> {
        let row: Option<ClientRow> = with_retry(|| {
                                         let mut conn = self.provider.connection()?;
                                         clients::table.find(client_id)
                                                       .select(ClientRow::as_select())
                                                       .first(&mut conn)
                                                       .optional()
                                                       .map_err(PersistenceError::from)
                                     })?;
        // Un cliente sin email se devuelve igual; el despachador decide.
        Ok(row.map(|r| ClientContact { client_id: r.id,
                                       name: r.name,
                                       email: r.email.unwrap_or_default() }))
    }
}
