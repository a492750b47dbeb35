//! Motor de workflows: definición de steps, inscripciones y reglas de
//! programación.

mod engine;
pub mod schedule;
mod store;

pub use engine::WorkflowEngine;
pub(crate) use engine::{enrollment_or_not_found, execution_or_not_found};
pub use store::{InMemoryWorkflowStore, WorkflowStore, WorkflowUnit};
