use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PayoutRequestId, PayoutStatus};
use crate::repository::RepositoryError;

/// Why the state machine refused a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDenial {
    NotManager,
    NotPending,
}

impl fmt::Display for TransitionDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotManager => f.write_str("caller does not hold the manager role"),
            Self::NotPending => f.write_str("request is no longer pending"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("illegal transition of payout request `{id}` from {from} to {to}: {denial}")]
    IllegalTransition {
        id: PayoutRequestId,
        from: PayoutStatus,
        to: PayoutStatus,
        denial: TransitionDenial,
    },
    #[error("payout request `{0}` is not part of the current list")]
    UnknownPayoutRequest(PayoutRequestId),
    #[error("unknown payout status `{0}` (expected pending|accepted|rejected)")]
    UnknownStatus(String),
}

/// Everything the workflow controller can fail with. Converted into a single
/// user-facing sentence at the controller boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("another payout request operation is already in flight")]
    ConcurrentOperationRejected,
}

impl WorkflowError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(DomainError::IllegalTransition { denial, from, .. }) => match denial {
                TransitionDenial::NotManager => {
                    "Only managers can approve or reject payout requests".to_string()
                }
                TransitionDenial::NotPending => {
                    format!("This payout request has already been {from}")
                }
            },
            Self::Domain(DomainError::UnknownPayoutRequest(_)) => {
                "Payout request not found. Refresh the list and try again.".to_string()
            }
            Self::Domain(DomainError::UnknownStatus(status)) => {
                format!("Unknown payout status `{status}`")
            }
            Self::Repository(RepositoryError::Unauthenticated) => "Not authenticated".to_string(),
            Self::Repository(RepositoryError::Remote { message, .. }) => message.clone(),
            Self::Repository(RepositoryError::Transport(_)) => {
                "Could not reach the payout service. Please retry shortly.".to_string()
            }
            Self::Repository(RepositoryError::Decode(_)) => {
                "The payout service returned an unexpected response.".to_string()
            }
            Self::ConcurrentOperationRejected => "Another request is already processing".to_string(),
        }
    }

    /// Stable machine-readable class, used in structured logs and CLI output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::IllegalTransition { .. }) => "illegal_transition",
            Self::Domain(DomainError::UnknownPayoutRequest(_)) => "unknown_request",
            Self::Domain(DomainError::UnknownStatus(_)) => "unknown_status",
            Self::Repository(RepositoryError::Unauthenticated) => "unauthenticated",
            Self::Repository(RepositoryError::Remote { .. }) => "remote",
            Self::Repository(RepositoryError::Transport(_)) => "transport",
            Self::Repository(RepositoryError::Decode(_)) => "decode",
            Self::ConcurrentOperationRejected => "concurrent_operation",
        }
    }
}
