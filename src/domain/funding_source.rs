use super::resource::ResourceId;
use crate::error::OnboardingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum BankAccountType {
    #[default]
    Checking,
    Savings,
}

impl BankAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
        }
    }
}

/// Bank account details as submitted by the end user.
///
/// Only ever travels inbound: the full account number is handed to the
/// processor once and then dropped, and `Debug` masks it.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    #[serde(default)]
    pub routing_number: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub account_type: BankAccountType,
    #[serde(default)]
    pub name: Option<String>,
}

impl fmt::Debug for BankDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankDetails")
            .field("routing_number", &self.routing_number)
            .field("account_number", &self.account_mask())
            .field("account_type", &self.account_type)
            .field("name", &self.name)
            .finish()
    }
}

impl BankDetails {
    pub fn validate(&self) -> Result<(), OnboardingError> {
        let routing = self.routing_number.trim();
        if routing.len() != 9 || !routing.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OnboardingError::Validation(
                "routingNumber must be exactly 9 digits".to_string(),
            ));
        }
        if !aba_checksum_ok(routing) {
            return Err(OnboardingError::Validation(format!(
                "routingNumber {routing} fails the ABA checksum"
            )));
        }

        let account = self.account_number.trim();
        if !(4..=17).contains(&account.len()) || !account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OnboardingError::Validation(
                "accountNumber must be 4 to 17 digits".to_string(),
            ));
        }

        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(OnboardingError::Validation(
                "name must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Last four digits of the account number, e.g. `****6789`.
    pub fn account_mask(&self) -> String {
        let chars: Vec<char> = self.account_number.trim().chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("****{tail}")
    }

    /// Display name for the account, defaulting to "<first> <last> Checking".
    pub fn display_name(&self, owner: &str) -> String {
        match &self.name {
            Some(name) => name.trim().to_string(),
            None => {
                let kind = match self.account_type {
                    BankAccountType::Checking => "Checking",
                    BankAccountType::Savings => "Savings",
                };
                format!("{owner} {kind}")
            }
        }
    }
}

/// Weighted mod-10 check used by ABA routing numbers (weights 3, 7, 1).
fn aba_checksum_ok(routing: &str) -> bool {
    const WEIGHTS: [u32; 3] = [3, 7, 1];
    let sum: u32 = routing
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * WEIGHTS[i % 3])
        .sum();
    sum % 10 == 0
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum VerificationStatus {
    Unverified,
    DepositsSent,
    Verified,
}

/// A bank account linked at the processor on behalf of a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSource {
    pub id: String,
    pub resource: ResourceId,
    pub customer_id: String,
    pub routing_number: String,
    pub account_mask: String,
    pub account_type: BankAccountType,
    pub name: String,
    pub status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

impl FundingSource {
    pub fn new(resource: ResourceId, customer_id: &str, bank: &BankDetails, name: String) -> Self {
        Self {
            id: resource.id().to_string(),
            resource,
            customer_id: customer_id.to_string(),
            routing_number: bank.routing_number.trim().to_string(),
            account_mask: bank.account_mask(),
            account_type: bank.account_type,
            name,
            status: VerificationStatus::Unverified,
            created_at: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}
