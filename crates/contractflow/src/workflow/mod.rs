//! Job, proposal and contract lifecycles.

pub mod engine;
pub mod error;
mod saga;
pub mod status;

pub use engine::{NewJob, NewTemplate, WorkflowEngine};
pub use error::WorkflowError;
pub use status::{ContractStatus, JobStatus, ProposalStatus, StatusMachine, UnknownStatus};
