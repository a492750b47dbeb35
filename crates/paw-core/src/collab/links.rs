use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Recurso al que apunta un link compartible incluido en un correo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareTarget {
    Contract(i64),
    Form(i64),
    Booking { appointment_type_id: Option<i64> },
}

pub trait LinkBuilder {
    fn share_link(&self, target: ShareTarget, client_id: i64) -> Result<String, CoreError>;
}

impl<T: LinkBuilder + ?Sized> LinkBuilder for &T {
    fn share_link(&self, target: ShareTarget, client_id: i64) -> Result<String, CoreError> {
        (**self).share_link(target, client_id)
    }
}

impl<T: LinkBuilder + ?Sized> LinkBuilder for Box<T> {
    fn share_link(&self, target: ShareTarget, client_id: i64) -> Result<String, CoreError> {
        (**self).share_link(target, client_id)
    }
}

/// Sin base URL configurada: cualquier step que pida un link falla con
/// `Validation` y su ejecución queda `failed`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLinks;

impl LinkBuilder for NoLinks {
    fn share_link(&self, target: ShareTarget, _client_id: i64) -> Result<String, CoreError> {
        Err(CoreError::Validation(format!("no share link base configured for {target:?}")))
    }
}
