use chrono::FixedOffset;
use serde::Serialize;

use crate::approvals::RecordActions;
use crate::attachments::resolve_attachment_url;
use crate::display::{format_amount, format_timestamp, status_label};
use crate::domain::{PayoutRequest, PayoutRequestId, PayoutStatus, StatusFilter};

/// Point-in-time copy of everything the approvals screen renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub filter: StatusFilter,
    pub filter_label: &'static str,
    pub loading: bool,
    pub error: Option<String>,
    pub processing_id: Option<PayoutRequestId>,
    pub pending_delete_id: Option<PayoutRequestId>,
    pub requests: Vec<PayoutRequestView>,
}

impl WorkflowView {
    pub fn find(&self, id: &PayoutRequestId) -> Option<&PayoutRequestView> {
        self.requests.iter().find(|request| &request.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayoutRequestView {
    pub id: PayoutRequestId,
    pub reference: String,
    pub submitted_by: String,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub amount: String,
    pub utr: Option<String>,
    pub remarks: Option<String>,
    pub status: PayoutStatus,
    pub status_label: &'static str,
    /// `None` renders as "No attachment".
    pub attachment_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub actions: RecordActions,
    pub processing: bool,
}

impl PayoutRequestView {
    pub(crate) fn build(
        record: &PayoutRequest,
        actions: RecordActions,
        processing: bool,
        api_base: &str,
        offset: FixedOffset,
    ) -> Self {
        Self {
            id: record.id.clone(),
            reference: record.reference.clone(),
            submitted_by: record.submitted_by.clone(),
            user_email: record.user_email.clone(),
            user_phone: record.user_phone.clone(),
            amount: format_amount(record.amount),
            utr: record.utr.clone(),
            remarks: record.remarks.clone(),
            status: record.status,
            status_label: status_label(record.status),
            attachment_url: resolve_attachment_url(record.proof_filename.as_deref(), api_base),
            created_at: format_timestamp(record.created_at, offset),
            updated_at: format_timestamp(record.updated_at, offset),
            actions,
            processing,
        }
    }
}
