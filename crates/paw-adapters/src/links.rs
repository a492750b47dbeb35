//! Links compartibles sobre una URL base pública.
//!
//! Formato:
//! - contrato: `{base}/contracts/{id}/sign?client={client_id}`
//! - formulario: `{base}/forms/{id}?client={client_id}`
//! - reserva: `{base}/book?client={client_id}[&appointment_type={id}]`

use paw_core::{CoreError, LinkBuilder, ShareTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrlLinkBuilder {
    base: String,
}

impl BaseUrlLinkBuilder {
    /// Valida que la base sea una URL http(s); descarta la `/` final.
    pub fn new(base: &str) -> Result<Self, CoreError> {
        let base = base.trim().trim_end_matches('/');
        let host = base.strip_prefix("https://")
                       .or_else(|| base.strip_prefix("http://"))
                       .ok_or_else(|| CoreError::Validation(format!("share base url must start with http:// or https://, got {base:?}")))?;
        if host.is_empty() {
            return Err(CoreError::Validation("share base url has no host".into()));
        }
        Ok(Self { base: base.to_string() })
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl LinkBuilder for BaseUrlLinkBuilder {
    fn share_link(&self, target: ShareTarget, client_id: i64) -> Result<String, CoreError> {
        let link = match target {
            ShareTarget::Contract(id) => format!("{}/contracts/{id}/sign?client={client_id}", self.base),
            ShareTarget::Form(id) => format!("{}/forms/{id}?client={client_id}", self.base),
            ShareTarget::Booking { appointment_type_id: Some(t) } => {
                format!("{}/book?client={client_id}&appointment_type={t}", self.base)
            }
            ShareTarget::Booking { appointment_type_id: None } => format!("{}/book?client={client_id}", self.base),
        };
        Ok(link)
    }
}
