use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Decision, PayoutRequest, PayoutRequestId, PayoutStatus};
use crate::session::Credential;

pub mod memory;

pub use memory::{InMemoryPayoutRequestRepository, RecordedCall};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("no credential is available for the current session")]
    Unauthenticated,
    #[error("backend responded with status {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

/// Backend contract for payout requests.
///
/// Every call is a single attempt. Implementations refuse to run without a
/// credential and report that as `Unauthenticated`, never as a network failure.
#[async_trait]
pub trait PayoutRequestRepository: Send + Sync {
    async fn list(
        &self,
        credential: Option<&Credential>,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>, RepositoryError>;

    async fn set_status(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
        decision: Decision,
        note: &str,
    ) -> Result<PayoutRequest, RepositoryError>;

    async fn delete(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
    ) -> Result<(), RepositoryError>;
}

pub fn require_credential(credential: Option<&Credential>) -> Result<&Credential, RepositoryError> {
    credential.ok_or(RepositoryError::Unauthenticated)
}
