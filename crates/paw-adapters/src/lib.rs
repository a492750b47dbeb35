//! paw-adapters: colaboradores concretos del despachador que no necesitan
//! base de datos.
//!
//! - `LogMailer`: "entrega" un correo escribiéndolo en el log. Útil en
//!   desarrollo y cuando el envío real lo hace un relay externo.
//! - `BaseUrlLinkBuilder`: arma los links compartibles (contrato, formulario,
//!   reserva) a partir de una URL base pública.

pub mod links;
pub mod mailer;

pub use links::BaseUrlLinkBuilder;
pub use mailer::LogMailer;
