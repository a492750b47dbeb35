use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Correo ya renderizado, listo para entregar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

/// Fallo de entrega. Se guarda en la ejecución; nunca aborta un tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Capacidad de envío. La implementación decide el transporte (log, outbox,
/// relay SMTP externo).
pub trait EmailSender {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

impl<T: EmailSender + ?Sized> EmailSender for &T {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        (**self).send(email)
    }
}

impl<T: EmailSender + ?Sized> EmailSender for Box<T> {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        (**self).send(email)
    }
}
