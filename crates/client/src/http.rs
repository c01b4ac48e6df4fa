use std::time::Duration;

use async_trait::async_trait;
use paydesk_core::config::{normalize_base_url, BackendConfig};
use paydesk_core::domain::{Decision, PayoutRequest, PayoutRequestId, PayoutStatus};
use paydesk_core::repository::{require_credential, PayoutRequestRepository, RepositoryError};
use paydesk_core::session::Credential;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const COLLECTION: [&str; 2] = ["api", "payout-requests"];

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid backend base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Http(String),
}

/// `PayoutRequestRepository` over the backend's REST API. One attempt per call.
#[derive(Clone, Debug)]
pub struct HttpPayoutRequestRepository {
    client: Client,
    base_url: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEnvelope {
    #[serde(default)]
    payout_requests: Option<Vec<PayoutRequest>>,
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: PayoutStatus,
    notes: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UpdatedRecord {
    Wrapped {
        #[serde(rename = "payoutRequest")]
        payout_request: PayoutRequest,
    },
    Bare(PayoutRequest),
}

impl UpdatedRecord {
    fn into_record(self) -> PayoutRequest {
        match self {
            Self::Wrapped { payout_request } => payout_request,
            Self::Bare(record) => record,
        }
    }
}

impl HttpPayoutRequestRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let normalized = normalize_base_url(base_url);
        let parsed = Url::parse(&normalized).map_err(|error| ClientBuildError::InvalidBaseUrl {
            url: normalized.clone(),
            reason: error.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidBaseUrl {
                url: normalized,
                reason: "url cannot carry a path".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientBuildError::Http(error.to_string()))?;

        Ok(Self { client, base_url: parsed })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ClientBuildError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RepositoryError::Transport(format!("base url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(COLLECTION)
            .extend(tail);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        credential: &Credential,
    ) -> Result<Response, RepositoryError> {
        request.bearer_auth(credential.bearer_token()).send().await.map_err(|error| {
            warn!(
                event_name = "client.request.failed",
                operation,
                error = %error,
                "payout backend unreachable"
            );
            RepositoryError::Transport(error.to_string())
        })
    }
}

#[async_trait]
impl PayoutRequestRepository for HttpPayoutRequestRepository {
    async fn list(
        &self,
        credential: Option<&Credential>,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>, RepositoryError> {
        let credential = require_credential(credential)?;
        let mut url = self.endpoint(&[])?;
        if let Some(status) = status {
            url.query_pairs_mut().append_pair("status", status.as_str());
        }

        let response = self.send("list", self.client.get(url), credential).await?;
        if !response.status().is_success() {
            return Err(remote_error(response, "Failed to fetch payout requests").await);
        }

        let envelope: ListEnvelope = decode(response).await?;
        let records = envelope.payout_requests.unwrap_or_default();
        debug!(event_name = "client.list.completed", count = records.len(), "listed payout requests");
        Ok(records)
    }

    async fn set_status(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
        decision: Decision,
        note: &str,
    ) -> Result<PayoutRequest, RepositoryError> {
        let credential = require_credential(credential)?;
        let url = self.endpoint(&[id.as_str(), "status"])?;
        let body = StatusUpdate { status: decision.target_status(), notes: note };

        let response =
            self.send("set_status", self.client.patch(url).json(&body), credential).await?;
        if !response.status().is_success() {
            return Err(remote_error(response, "Failed to update request status").await);
        }

        let updated: UpdatedRecord = decode(response).await?;
        Ok(updated.into_record())
    }

    async fn delete(
        &self,
        credential: Option<&Credential>,
        id: &PayoutRequestId,
    ) -> Result<(), RepositoryError> {
        let credential = require_credential(credential)?;
        let url = self.endpoint(&[id.as_str()])?;

        let response = self.send("delete", self.client.delete(url), credential).await?;
        if !response.status().is_success() {
            return Err(remote_error(response, "Failed to delete payout request").await);
        }
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RepositoryError> {
    let body = response
        .bytes()
        .await
        .map_err(|error| RepositoryError::Transport(error.to_string()))?;
    serde_json::from_slice(&body).map_err(|error| {
        warn!(event_name = "client.response.undecodable", error = %error, "bad response body");
        RepositoryError::Decode(error.to_string())
    })
}

/// Prefers the backend's `message`; anything else gets `"{fallback} ({status})"`.
async fn remote_error(response: Response, fallback: &str) -> RepositoryError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|payload| payload.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("{fallback} ({status})"));

    warn!(event_name = "client.response.rejected", status, message = %message, "backend refused");
    RepositoryError::Remote { status, message }
}
