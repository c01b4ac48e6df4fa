use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PayoutRequestId(pub String);

impl PayoutRequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayoutRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PayoutRequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Backends differ on whether ids are strings or integers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(value) => Self(value),
            RawId::Number(value) => Self(value.to_string()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Accepted,
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// List filter; `All` sends no status constraint to the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Accepted,
    Rejected,
}

impl StatusFilter {
    pub fn status(&self) -> Option<PayoutStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(PayoutStatus::Pending),
            Self::Accepted => Some(PayoutStatus::Accepted),
            Self::Rejected => Some(PayoutStatus::Rejected),
        }
    }

    pub fn matches(&self, status: PayoutStatus) -> bool {
        self.status().map_or(true, |wanted| wanted == status)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Pending => "Pending Review",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
        }
    }
}

impl From<PayoutStatus> for StatusFilter {
    fn from(status: PayoutStatus) -> Self {
        match status {
            PayoutStatus::Pending => Self::Pending,
            PayoutStatus::Accepted => Self::Accepted,
            PayoutStatus::Rejected => Self::Rejected,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse::<PayoutStatus>().map(Self::from)
    }
}

/// A manager's disposition of a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> PayoutStatus {
        match self {
            Self::Accept => PayoutStatus::Accepted,
            Self::Reject => PayoutStatus::Rejected,
        }
    }

    /// Provenance note sent alongside the status change. Informational only.
    pub fn note(&self) -> &'static str {
        match self {
            Self::Accept => "Approved by manager",
            Self::Reject => "Rejected by manager",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub id: PayoutRequestId,
    pub reference: String,
    pub submitted_by: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_phone: Option<String>,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub utr: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub remarks: Option<String>,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub proof_filename: Option<String>,
}

impl PayoutRequest {
    pub fn is_pending(&self) -> bool {
        self.status == PayoutStatus::Pending
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}
