use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Actor, Decision, PayoutRequest, PayoutRequestId, PayoutStatus};
use crate::errors::{DomainError, TransitionDenial};

/// An authorized transition, ready to be sent to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub id: PayoutRequestId,
    pub from: PayoutStatus,
    pub to: PayoutStatus,
    pub decision: Decision,
    pub note: String,
}

/// Controls a presentation layer may offer for one record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordActions {
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_delete: bool,
}

/// `pending -> accepted` and `pending -> rejected`, nothing else. Deletion is not a
/// transition and is allowed from every state.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApprovalStateMachine;

impl ApprovalStateMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn can_transition(from: PayoutStatus, to: PayoutStatus) -> bool {
        matches!(
            (from, to),
            (PayoutStatus::Pending, PayoutStatus::Accepted)
                | (PayoutStatus::Pending, PayoutStatus::Rejected)
        )
    }

    /// Checks the caller first, then the record's state. Runs before any I/O.
    pub fn authorize(
        &self,
        actor: &Actor,
        record: &PayoutRequest,
        decision: Decision,
    ) -> Result<TransitionPlan, DomainError> {
        let to = decision.target_status();
        if !actor.is_manager() {
            return Err(illegal(record, to, TransitionDenial::NotManager));
        }
        if !Self::can_transition(record.status, to) {
            return Err(illegal(record, to, TransitionDenial::NotPending));
        }

        Ok(TransitionPlan {
            id: record.id.clone(),
            from: record.status,
            to,
            decision,
            note: decision.note().to_string(),
        })
    }

    pub fn available_actions(&self, actor: &Actor, record: &PayoutRequest) -> RecordActions {
        let transitionable = actor.is_manager() && record.is_pending();
        RecordActions { can_approve: transitionable, can_reject: transitionable, can_delete: true }
    }

    /// Record-level legality only: the returned copy carries the new status and an
    /// `updated_at` strictly after the previous one, even if the clock stalls.
    pub fn settle(
        &self,
        record: &PayoutRequest,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, DomainError> {
        let to = decision.target_status();
        if !Self::can_transition(record.status, to) {
            return Err(illegal(record, to, TransitionDenial::NotPending));
        }

        let floor = record.updated_at + Duration::microseconds(1);
        let mut settled = record.clone();
        settled.status = to;
        settled.updated_at = now.max(floor);
        Ok(settled)
    }
}

fn illegal(record: &PayoutRequest, to: PayoutStatus, denial: TransitionDenial) -> DomainError {
    DomainError::IllegalTransition { id: record.id.clone(), from: record.status, to, denial }
}
