//! paw-core: ledger de créditos y motor de workflows de email.
pub mod booking;
pub mod collab;
pub mod dispatch;
pub mod errors;
pub mod ledger;
pub mod workflow;

pub use booking::{charge_booking, BookingCharge, ChargeOutcome};
pub use collab::{ClientDirectory, DeliveryError, EmailSender, InMemoryClientDirectory, LinkBuilder, NoLinks, OutgoingEmail,
                 PlaceholderRenderer, RenderContext, ShareTarget, TemplateRenderer};
pub use dispatch::{DispatchConfig, Dispatcher, DispatcherBuilder, TickReport};
pub use errors::CoreError;
pub use ledger::{verify_chain, CreditLedger, InMemoryLedgerStore, LedgerStore, LedgerUnit};
pub use workflow::{InMemoryWorkflowStore, WorkflowEngine, WorkflowStore, WorkflowUnit};
