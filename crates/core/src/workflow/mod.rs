//! The approvals screen as a state machine over a repository and a session.

pub mod controller;
pub mod view;

pub use controller::{ActionOutcome, WorkflowController, WorkflowSettings};
pub use view::{PayoutRequestView, WorkflowView};
