use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use paw_domain::ClientContact;

use crate::errors::CoreError;

/// Lectura de los datos de contacto de un cliente.
pub trait ClientDirectory {
    fn contact(&self, client_id: i64) -> Result<Option<ClientContact>, CoreError>;
}

impl<T: ClientDirectory + ?Sized> ClientDirectory for &T {
    fn contact(&self, client_id: i64) -> Result<Option<ClientContact>, CoreError> {
        (**self).contact(client_id)
    }
}

impl<T: ClientDirectory + ?Sized> ClientDirectory for Box<T> {
    fn contact(&self, client_id: i64) -> Result<Option<ClientContact>, CoreError> {
        (**self).contact(client_id)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryClientDirectory {
    contacts: Arc<RwLock<HashMap<i64, ClientContact>>>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: ClientContact) {
        if let Ok(mut map) = self.contacts.write() {
            map.insert(contact.client_id, contact);
        }
    }
}

impl ClientDirectory for InMemoryClientDirectory {
    fn contact(&self, client_id: i64) -> Result<Option<ClientContact>, CoreError> {
        let map = self.contacts
                      .read()
                      .map_err(|_| CoreError::Persistence("in-memory client directory poisoned".into()))?;
        Ok(map.get(&client_id).cloned())
    }
}
