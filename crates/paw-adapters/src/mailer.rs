use log::{debug, info};
use paw_core::{DeliveryError, EmailSender, OutgoingEmail};

/// Mailer que sólo registra el envío.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    from: Option<String>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remitente que aparece en el log; sin él se muestra `-`.
    pub fn with_from(from: impl Into<String>) -> Self {
        let from = from.into();
        let from = if from.trim().is_empty() { None } else { Some(from) };
        Self { from }
    }

    pub fn from_address(&self) -> Option<&str> {
        self.from.as_deref()
    }
}

impl EmailSender for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        if email.to.trim().is_empty() {
            return Err(DeliveryError("recipient address is empty".into()));
        }
        info!("email from={} to={} subject={:?} html_len={} text={}",
              self.from.as_deref().unwrap_or("-"),
              email.to,
              email.subject,
              email.html_body.len(),
              email.text_body.is_some());
        debug!("email body to={}:\n{}", email.to, email.html_body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail { to: to.into(),
                        subject: "Hola".into(),
                        html_body: "<p>hi</p>".into(),
                        text_body: None }
    }

    #[test]
    fn sends_to_valid_address() {
        let mailer = LogMailer::with_from("studio@example.com");
        assert_eq!(mailer.from_address(), Some("studio@example.com"));
        assert!(mailer.send(&email("ana@example.com")).is_ok());
    }

    #[test]
    fn empty_recipient_is_a_delivery_failure() {
        let err = LogMailer::new().send(&email("  ")).unwrap_err();
        assert_eq!(err.to_string(), "delivery failed: recipient address is empty");
    }

    #[test]
    fn blank_from_is_ignored() {
        assert_eq!(LogMailer::with_from(" ").from_address(), None);
    }
}
