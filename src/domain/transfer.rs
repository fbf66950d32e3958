use super::money::{Amount, USD};
use super::resource::ResourceId;
use crate::error::OnboardingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Requested,
    Accepted,
    Rejected,
}

/// The processor's reason for refusing a transfer, kept so a replay of the
/// same idempotency key reports the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub status: u16,
    pub code: String,
    pub detail: String,
}

/// A single attempt to move funds from a verified funding source to the
/// operator's destination account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Assigned by the processor once accepted.
    pub id: Option<String>,
    pub resource: Option<ResourceId>,
    pub idempotency_key: String,
    pub source: ResourceId,
    pub destination: ResourceId,
    pub amount: Amount,
    pub currency: String,
    pub status: TransferStatus,
    pub rejection: Option<Rejection>,
    pub requested_at: DateTime<Utc>,
}

impl Transfer {
    pub fn requested(
        idempotency_key: String,
        source: ResourceId,
        destination: ResourceId,
        amount: Amount,
    ) -> Self {
        Self {
            id: None,
            resource: None,
            idempotency_key,
            source,
            destination,
            amount,
            currency: USD.to_string(),
            status: TransferStatus::Requested,
            rejection: None,
            requested_at: Utc::now(),
        }
    }

    pub fn accept(mut self, resource: ResourceId) -> Self {
        self.id = Some(resource.id().to_string());
        self.resource = Some(resource);
        self.status = TransferStatus::Accepted;
        self
    }

    pub fn reject(mut self, status: u16, code: &str, detail: &str) -> Self {
        self.status = TransferStatus::Rejected;
        self.rejection = Some(Rejection {
            status,
            code: code.to_string(),
            detail: detail.to_string(),
        });
        self
    }

    /// Replays a settled outcome: the transfer itself when accepted, the
    /// original rejection otherwise.
    pub fn outcome(&self) -> Result<Transfer, OnboardingError> {
        match &self.rejection {
            Some(r) => Err(OnboardingError::rejected(r.status, &r.code, &r.detail)),
            None => Ok(self.clone()),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status != TransferStatus::Requested
    }
}
