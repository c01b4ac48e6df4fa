use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::approvals::ApprovalStateMachine;
use crate::domain::{Decision, PayoutRequest, PayoutRequestId, PayoutStatus};
use crate::session::Credential;

use super::{require_credential, PayoutRequestRepository, RepositoryError};

/// One call received by the in-memory backend, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    List { status: Option<PayoutStatus> },
    SetStatus { id: PayoutRequestId, decision: Decision, note: String },
    Delete { id: PayoutRequestId },
}

#[derive(Debug, Default)]
struct Backend {
    records: Vec<PayoutRequest>,
    calls: Vec<RecordedCall>,
    scripted_failures: VecDeque<RepositoryError>,
}

/// Backend stand-in that behaves like the REST service: 404 for unknown ids,
/// 409 for transitions of settled records.
#[derive(Debug, Default)]
pub struct InMemoryPayoutRequestRepository {
    backend: Mutex<Backend>,
    machine: ApprovalStateMachine,
}

impl InMemoryPayoutRequestRepository {
    pub fn with_records(records: Vec<PayoutRequest>) -> Self {
        Self {
            backend: Mutex::new(Backend { records, ..Backend::default() }),
            machine: ApprovalStateMachine::new(),
        }
    }

    pub fn insert(&self, record: PayoutRequest) {
        self.backend().records.push(record);
    }

    pub fn get(&self, id: &PayoutRequestId) -> Option<PayoutRequest> {
        self.backend().records.iter().find(|record| &record.id == id).cloned()
    }

    pub fn records(&self) -> Vec<PayoutRequest> {
        self.backend().records.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.backend().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.backend()
            .calls
            .iter()
            .filter(|call| matches!(call, RecordedCall::List { .. }))
            .count()
    }

    pub fn mutation_calls(&self) -> usize {
        self.backend()
            .calls
            .iter()
            .filter(|call| !matches!(call, RecordedCall::List { .. }))
            .count()
    }

    /// The next authenticated call fails with `error` after being recorded.
    pub fn fail_next(&self, error: RepositoryError) {
        self.backend().scripted_failures.push_back(error);
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        match self.backend.lock() {
            Ok(backend) => backend,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PayoutRequestRepository for InMemoryPayoutRequestRepository {
    async fn list(
        &self,
        credential: Option<&Credential>,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>, RepositoryError> {
        require_credential(credential)?;
        let mut backend = self.backend();
        backend.calls.push(RecordedCall::List { status });
        if let Some(error) = backend.scripted_failures.pop_front() {
            return Err(error);
        }

        Ok(backend
            .records
            .iter()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
        decision: Decision,
        note: &str,
    ) -> Result<PayoutRequest, RepositoryError> {
        require_credential(credential)?;
        let mut backend = self.backend();
        backend.calls.push(RecordedCall::SetStatus {
            id: id.clone(),
            decision,
            note: note.to_string(),
        });
        if let Some(error) = backend.scripted_failures.pop_front() {
            return Err(error);
        }

        let Some(slot) = backend.records.iter_mut().find(|record| &record.id == id) else {
            return Err(not_found());
        };
        let settled = self.machine.settle(slot, decision, Utc::now()).map_err(|error| {
            RepositoryError::Remote { status: 409, message: error.to_string() }
        })?;
        *slot = settled.clone();
        Ok(settled)
    }

    async fn delete(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
    ) -> Result<(), RepositoryError> {
        require_credential(credential)?;
        let mut backend = self.backend();
        backend.calls.push(RecordedCall::Delete { id: id.clone() });
        if let Some(error) = backend.scripted_failures.pop_front() {
            return Err(error);
        }

        let before = backend.records.len();
        backend.records.retain(|record| &record.id != id);
        if backend.records.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

fn not_found() -> RepositoryError {
    RepositoryError::Remote { status: 404, message: "Payout request not found".to_string() }
}
