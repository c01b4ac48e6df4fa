use std::sync::{Arc, Mutex, MutexGuard};

use chrono::FixedOffset;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approvals::ApprovalStateMachine;
use crate::audit::{AuditEvent, AuditSink, PayoutAuditKind, TracingAuditSink};
use crate::config::{normalize_base_url, AppConfig};
use crate::domain::{Actor, Decision, PayoutRequest, PayoutRequestId, StatusFilter};
use crate::errors::{DomainError, WorkflowError};
use crate::repository::PayoutRequestRepository;
use crate::session::SessionProvider;
use crate::workflow::view::{PayoutRequestView, WorkflowView};

#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub api_base: String,
    pub display_offset: FixedOffset,
}

impl WorkflowSettings {
    pub fn new(api_base: &str, display_offset: FixedOffset) -> Self {
        Self { api_base: normalize_base_url(api_base), display_offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.backend.base_url, config.display.offset())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// First half of the delete gesture; nothing was sent.
    AwaitingConfirmation,
    /// Another transition or delete is in flight; nothing was sent.
    AlreadyProcessing,
    /// A newer read started before this one finished; its result was dropped.
    Superseded,
    Failed(WorkflowError),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    filter: StatusFilter,
    records: Vec<PayoutRequest>,
    loading: bool,
    error: Option<String>,
    in_flight: Option<PayoutRequestId>,
    armed_delete: Option<PayoutRequestId>,
    read_generation: u64,
    flight_token: u64,
}

/// Owns the approvals list, the status filter, the single-flight marker and the
/// armed delete. None of it is reachable except through these methods.
///
/// The state lock is never held across an `.await`, so concurrently polled
/// operations see each other's markers.
pub struct WorkflowController<R, S> {
    repository: R,
    session: S,
    machine: ApprovalStateMachine,
    settings: WorkflowSettings,
    audit: Arc<dyn AuditSink>,
    state: Mutex<ControllerState>,
}

impl<R, S> WorkflowController<R, S>
where
    R: PayoutRequestRepository,
    S: SessionProvider,
{
    pub fn new(repository: R, session: S, settings: WorkflowSettings) -> Self {
        Self {
            repository,
            session,
            machine: ApprovalStateMachine::new(),
            settings,
            audit: Arc::new(TracingAuditSink),
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sets the starting filter without issuing a read.
    pub fn with_filter(self, filter: StatusFilter) -> Self {
        self.lock_state().filter = filter;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn filter(&self) -> StatusFilter {
        self.lock_state().filter
    }

    pub fn records(&self) -> Vec<PayoutRequest> {
        self.lock_state().records.clone()
    }

    pub fn snapshot(&self) -> WorkflowView {
        let actor = self.session.actor();
        let state = self.lock_state();
        let requests = state
            .records
            .iter()
            .map(|record| {
                PayoutRequestView::build(
                    record,
                    self.machine.available_actions(&actor, record),
                    state.in_flight.as_ref() == Some(&record.id),
                    &self.settings.api_base,
                    self.settings.display_offset,
                )
            })
            .collect();

        WorkflowView {
            filter: state.filter,
            filter_label: state.filter.label(),
            loading: state.loading,
            error: state.error.clone(),
            processing_id: state.in_flight.clone(),
            pending_delete_id: state.armed_delete.clone(),
            requests,
        }
    }

    /// Reloads only when the filter actually changes.
    pub async fn set_filter(&self, filter: StatusFilter) -> ActionOutcome {
        {
            let mut state = self.lock_state();
            if state.filter == filter {
                return ActionOutcome::Completed;
            }
            state.filter = filter;
            state.armed_delete = None;
        }

        info!(event_name = "workflow.filter.changed", filter = ?filter, "status filter changed");
        self.reload().await
    }

    /// Reads are not single-flight, but only the most recently started read may
    /// land in state.
    pub async fn reload(&self) -> ActionOutcome {
        let (generation, filter) = {
            let mut state = self.lock_state();
            state.read_generation += 1;
            state.loading = true;
            state.error = None;
            (state.read_generation, state.filter)
        };

        let credential = self.session.credential();
        let result = self.repository.list(credential.as_ref(), filter.status()).await;

        let mut state = self.lock_state();
        if state.read_generation != generation {
            debug!(
                event_name = "workflow.list.superseded",
                generation,
                latest_generation = state.read_generation,
                "discarding stale list result"
            );
            return ActionOutcome::Superseded;
        }

        state.loading = false;
        match result {
            Ok(records) => {
                info!(
                    event_name = "workflow.list.loaded",
                    filter = ?filter,
                    count = records.len(),
                    "payout requests loaded"
                );
                state.records = records;
                ActionOutcome::Completed
            }
            Err(error) => {
                warn!(
                    event_name = "workflow.list.failed",
                    filter = ?filter,
                    error = %error,
                    "failed to load payout requests"
                );
                fail(&mut state, error.into())
            }
        }
    }

    pub async fn approve(&self, id: &PayoutRequestId) -> ActionOutcome {
        self.transition(id, Decision::Accept).await
    }

    pub async fn reject(&self, id: &PayoutRequestId) -> ActionOutcome {
        self.transition(id, Decision::Reject).await
    }

    async fn transition(&self, id: &PayoutRequestId, decision: Decision) -> ActionOutcome {
        let actor = self.session.actor();
        let correlation_id = Uuid::new_v4().to_string();

        let (plan, flight) = {
            let mut state = self.lock_state();
            if let Some(in_flight) = &state.in_flight {
                debug!(
                    event_name = "workflow.transition.busy",
                    payout_request_id = %id,
                    in_flight_id = %in_flight,
                    "another operation is in flight"
                );
                return ActionOutcome::AlreadyProcessing;
            }

            let authorized = match state.records.iter().find(|record| &record.id == id) {
                Some(record) => self.machine.authorize(&actor, record, decision),
                None => Err(DomainError::UnknownPayoutRequest(id.clone())),
            };
            match authorized {
                Ok(plan) => {
                    state.armed_delete = None;
                    state.error = None;
                    (plan, self.claim(&mut state, id))
                }
                Err(error) => {
                    warn!(
                        event_name = "workflow.transition.rejected",
                        correlation_id = %correlation_id,
                        payout_request_id = %id,
                        actor = %actor.user_id,
                        error = %error,
                        "transition refused before reaching the backend"
                    );
                    self.audit.emit(
                        self.event(PayoutAuditKind::TransitionRejected, id, &correlation_id, &actor)
                            .with_decision(decision)
                            .with_reason(error.to_string()),
                    );
                    return fail(&mut state, error.into());
                }
            }
        };

        let credential = self.session.credential();
        let result =
            self.repository.set_status(credential.as_ref(), id, decision, &plan.note).await;

        match result {
            Ok(updated) => {
                info!(
                    event_name = "workflow.transition.applied",
                    correlation_id = %correlation_id,
                    payout_request_id = %id,
                    from = %plan.from,
                    to = %updated.status,
                    "payout request status updated"
                );
                self.audit.emit(
                    self.event(PayoutAuditKind::TransitionApplied, id, &correlation_id, &actor)
                        .with_decision(decision)
                        .with_statuses(plan.from, updated.status)
                        .with_note(plan.note.clone()),
                );

                self.reload().await;
                drop(flight);
                ActionOutcome::Completed
            }
            Err(error) => {
                warn!(
                    event_name = "workflow.transition.failed",
                    correlation_id = %correlation_id,
                    payout_request_id = %id,
                    error = %error,
                    "backend refused status update"
                );
                self.audit.emit(
                    self.event(PayoutAuditKind::TransitionFailed, id, &correlation_id, &actor)
                        .with_decision(decision)
                        .with_reason(error.to_string()),
                );

                let mut state = self.lock_state();
                fail(&mut state, error.into())
            }
        }
    }

    /// Two-step delete: the first call for an id arms it, a second call for the
    /// same id commits.
    pub async fn delete(&self, id: &PayoutRequestId) -> ActionOutcome {
        let actor = self.session.actor();
        let correlation_id = Uuid::new_v4().to_string();

        let flight = {
            let mut state = self.lock_state();
            if state.in_flight.is_some() {
                debug!(
                    event_name = "workflow.delete.busy",
                    payout_request_id = %id,
                    "another operation is in flight"
                );
                return ActionOutcome::AlreadyProcessing;
            }

            if state.armed_delete.as_ref() != Some(id) {
                state.armed_delete = Some(id.clone());
                info!(
                    event_name = "workflow.delete.armed",
                    correlation_id = %correlation_id,
                    payout_request_id = %id,
                    "delete awaiting confirmation"
                );
                self.audit
                    .emit(self.event(PayoutAuditKind::DeleteArmed, id, &correlation_id, &actor));
                return ActionOutcome::AwaitingConfirmation;
            }

            state.armed_delete = None;
            state.error = None;
            self.claim(&mut state, id)
        };

        let credential = self.session.credential();
        match self.repository.delete(credential.as_ref(), id).await {
            Ok(()) => {
                info!(
                    event_name = "workflow.delete.committed",
                    correlation_id = %correlation_id,
                    payout_request_id = %id,
                    "payout request deleted"
                );
                self.audit.emit(self.event(PayoutAuditKind::Deleted, id, &correlation_id, &actor));

                self.reload().await;
                drop(flight);
                ActionOutcome::Completed
            }
            Err(error) => {
                warn!(
                    event_name = "workflow.delete.failed",
                    correlation_id = %correlation_id,
                    payout_request_id = %id,
                    error = %error,
                    "backend refused delete"
                );
                self.audit.emit(
                    self.event(PayoutAuditKind::DeleteFailed, id, &correlation_id, &actor)
                        .with_reason(error.to_string()),
                );

                let mut state = self.lock_state();
                fail(&mut state, error.into())
            }
        }
    }

    /// Disarms a pending delete. Returns whether anything was armed.
    pub fn cancel_delete(&self) -> bool {
        self.lock_state().armed_delete.take().is_some()
    }

    /// Sets the single-flight marker. The marker is released when the returned
    /// guard drops, including when the caller abandons the operation mid-await.
    fn claim(&self, state: &mut ControllerState, id: &PayoutRequestId) -> InFlight<'_> {
        state.flight_token += 1;
        state.in_flight = Some(id.clone());
        InFlight { state: &self.state, token: state.flight_token }
    }

    fn event(
        &self,
        kind: PayoutAuditKind,
        id: &PayoutRequestId,
        correlation_id: &str,
        actor: &Actor,
    ) -> AuditEvent {
        AuditEvent::new(kind, id.clone(), correlation_id, &actor.user_id)
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        lock(&self.state)
    }
}

struct InFlight<'a> {
    state: &'a Mutex<ControllerState>,
    token: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.flight_token == self.token {
            state.in_flight = None;
        }
    }
}

fn lock(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    match state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Clears the list and the marker, and bumps the read generation so a read
/// still in flight cannot repopulate the list under the error.
fn fail(state: &mut ControllerState, error: WorkflowError) -> ActionOutcome {
    state.records.clear();
    state.in_flight = None;
    state.read_generation += 1;
    state.loading = false;
    state.error = Some(error.user_message());
    ActionOutcome::Failed(error)
}
