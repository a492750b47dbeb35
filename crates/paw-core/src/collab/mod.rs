//! Colaboradores externos que el despachador necesita: envío de correo,
//! datos de contacto del cliente, render de plantillas y links compartibles.

mod directory;
mod email;
mod links;
mod render;

pub use directory::{ClientDirectory, InMemoryClientDirectory};
pub use email::{DeliveryError, EmailSender, OutgoingEmail};
pub use links::{LinkBuilder, NoLinks, ShareTarget};
pub use render::{PlaceholderRenderer, RenderContext, TemplateRenderer};
