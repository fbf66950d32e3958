use super::funding_source::FundingSource;
use super::resource::ResourceId;
use super::transfer::Transfer;
use crate::error::OnboardingError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a customer stands in the onboarding sequence.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum CustomerStatus {
    Created,
    BankLinked,
    DepositsPending,
    Verified,
    TransferInitiated,
    Failed,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::BankLinked => "BankLinked",
            Self::DepositsPending => "DepositsPending",
            Self::Verified => "Verified",
            Self::TransferInitiated => "TransferInitiated",
            Self::Failed => "Failed",
        }
    }
}

/// Personal details submitted when the customer is created.
///
/// The identity fields (`address1` through `ssn`) are all-or-nothing: with
/// them the processor creates a verified personal customer, without them an
/// unverified one. The national id is write-only and never serialized back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing)]
    pub ssn: Option<String>,
}

impl Profile {
    /// Checks everything the processor would otherwise reject, before any remote call.
    pub fn validate(&self) -> Result<(), OnboardingError> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("firstName");
        }
        if self.last_name.trim().is_empty() {
            missing.push("lastName");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if !missing.is_empty() {
            return Err(OnboardingError::Validation(format!(
                "missing required profile fields: {}",
                missing.join(", ")
            )));
        }

        match self.email.trim().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
            _ => {
                return Err(OnboardingError::Validation(format!(
                    "'{}' is not an email address",
                    self.email
                )));
            }
        }

        let identity = [
            ("address1", &self.address1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("dateOfBirth", &self.date_of_birth),
            ("ssn", &self.ssn),
        ];
        let given = identity
            .iter()
            .filter(|(_, value)| present(value))
            .count();
        if given > 0 && given < identity.len() {
            let absent: Vec<&str> = identity
                .iter()
                .filter(|(_, value)| !present(value))
                .map(|(name, _)| *name)
                .collect();
            return Err(OnboardingError::Validation(format!(
                "identity fields must be given together; missing: {}",
                absent.join(", ")
            )));
        }

        if let Some(dob) = self.date_of_birth.as_deref().filter(|d| !d.trim().is_empty()) {
            NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d").map_err(|_| {
                OnboardingError::Validation(format!("dateOfBirth '{dob}' is not YYYY-MM-DD"))
            })?;
        }

        Ok(())
    }

    /// True when the full set of identity fields was supplied.
    pub fn is_personal(&self) -> bool {
        present(&self.ssn) && present(&self.date_of_birth) && present(&self.address1)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// A customer's onboarding record.
///
/// Created only after the processor accepted the customer, mutated only by
/// completed workflow steps, and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub resource: ResourceId,
    pub profile: Profile,
    pub status: CustomerStatus,
    pub funding_source: Option<FundingSource>,
    pub transfers: Vec<Transfer>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(resource: ResourceId, profile: Profile) -> Self {
        let now = Utc::now();
        Self {
            id: resource.id().to_string(),
            resource,
            profile,
            status: CustomerStatus::Created,
            funding_source: None,
            transfers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, next: CustomerStatus) {
        self.status = next;
        self.updated_at = Utc::now();
    }

    /// Fails with `PreconditionFailed` unless the customer is in `expected`.
    pub fn require(&self, expected: CustomerStatus, step: &str) -> Result<(), OnboardingError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(OnboardingError::PreconditionFailed(format!(
                "cannot {step} for customer {} in status {} (requires {})",
                self.id,
                self.status.as_str(),
                expected.as_str()
            )))
        }
    }

    pub fn transfer_by_key(&self, idempotency_key: &str) -> Option<&Transfer> {
        self.transfers
            .iter()
            .find(|t| t.idempotency_key == idempotency_key)
    }
}
