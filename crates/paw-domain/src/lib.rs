// paw-domain library entry point
pub mod client;
pub mod credits;
pub mod delay;
pub mod enrollment;
pub mod error;
pub mod workflow;

pub use client::ClientContact;
pub use credits::{ClientCredits, CreditTransaction, NewCreditTransaction, TransactionType};
pub use delay::{Delay, DelayUnit};
pub use enrollment::{Enrollment, EnrollmentStatus, ExecutionStatus, NewEnrollment, NewStepExecution, StepExecution};
pub use error::DomainError;
pub use workflow::{DelayType, StepAttachments, StepDraft, StepSchedule, Workflow, WorkflowDraft, WorkflowStep};
