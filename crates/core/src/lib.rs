pub mod approvals;
pub mod attachments;
pub mod audit;
pub mod config;
pub mod display;
pub mod domain;
pub mod errors;
pub mod repository;
pub mod session;
pub mod workflow;

pub use approvals::{ApprovalStateMachine, RecordActions, TransitionPlan};
pub use attachments::resolve_attachment_url;
pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, PayoutAuditKind, TracingAuditSink};
pub use domain::{Actor, Decision, PayoutRequest, PayoutRequestId, PayoutStatus, StatusFilter};
pub use errors::{DomainError, TransitionDenial, WorkflowError};
pub use repository::{InMemoryPayoutRequestRepository, PayoutRequestRepository, RepositoryError};
pub use session::{Credential, SessionProvider, StaticSession};
pub use workflow::{ActionOutcome, WorkflowController, WorkflowSettings, WorkflowView};
