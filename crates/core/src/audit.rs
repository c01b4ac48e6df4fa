use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Decision, PayoutRequestId, PayoutStatus};

/// Every decision point the approvals workflow records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutAuditKind {
    TransitionApplied,
    TransitionRejected,
    TransitionFailed,
    DeleteArmed,
    Deleted,
    DeleteFailed,
}

impl PayoutAuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransitionApplied => "payout.transition_applied",
            Self::TransitionRejected => "payout.transition_rejected",
            Self::TransitionFailed => "payout.transition_failed",
            Self::DeleteArmed => "payout.delete_armed",
            Self::Deleted => "payout.deleted",
            Self::DeleteFailed => "payout.delete_failed",
        }
    }

    pub fn outcome(&self) -> AuditOutcome {
        match self {
            Self::TransitionApplied | Self::DeleteArmed | Self::Deleted => AuditOutcome::Success,
            Self::TransitionRejected => AuditOutcome::Rejected,
            Self::TransitionFailed | Self::DeleteFailed => AuditOutcome::Failed,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::DeleteArmed | Self::Deleted | Self::DeleteFailed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// One recorded decision on a payout request. Transition fields stay `None` for
/// deletion events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub kind: PayoutAuditKind,
    pub payout_request_id: PayoutRequestId,
    pub correlation_id: String,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub decision: Option<Decision>,
    pub from: Option<PayoutStatus>,
    pub to: Option<PayoutStatus>,
    pub note: Option<String>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: PayoutAuditKind,
        payout_request_id: PayoutRequestId,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            payout_request_id,
            correlation_id: correlation_id.into(),
            actor: actor.into(),
            outcome: kind.outcome(),
            decision: None,
            from: None,
            to: None,
            note: None,
            reason: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_statuses(mut self, from: PayoutStatus, to: PayoutStatus) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn kinds(&self) -> Vec<PayoutAuditKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes audit events into the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            event_name = "audit.event_recorded",
            audit_event_id = %event.event_id,
            audit_event_type = event.event_type(),
            correlation_id = %event.correlation_id,
            payout_request_id = %event.payout_request_id,
            actor = %event.actor,
            outcome = ?event.outcome,
            decision = ?event.decision,
            from = ?event.from,
            to = ?event.to,
            reason = event.reason.as_deref().unwrap_or(""),
            "payout audit event"
        );
    }
}
