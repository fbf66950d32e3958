//! Requests and responses exchanged with the remote ACH processor.
//!
//! Bodies follow the processor's HAL-flavored JSON: camelCase fields, money as
//! `{value, currency}` and links to other resources under `_links`.

use super::customer::Profile;
use super::funding_source::BankDetails;
use super::money::{Amount, Money};
use super::resource::ResourceId;
use crate::error::{OnboardingError, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateCustomer,
    AttachFundingSource,
    InitiateMicroDeposits,
    VerifyMicroDeposits,
    CreateTransfer,
}

impl Operation {
    /// Transfers move money and are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::CreateTransfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateCustomer => "create_customer",
            Self::AttachFundingSource => "attach_funding_source",
            Self::InitiateMicroDeposits => "initiate_micro_deposits",
            Self::VerifyMicroDeposits => "verify_micro_deposits",
            Self::CreateTransfer => "create_transfer",
        }
    }
}

/// One call against the processor.
///
/// `target` is the resource the operation applies to; it is `None` for
/// operations on a top-level collection (customers, transfers).
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub operation: Operation,
    pub target: Option<ResourceId>,
    pub payload: Option<Value>,
    pub idempotency_key: Option<String>,
}

impl GatewayRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            target: None,
            payload: None,
            idempotency_key: None,
        }
    }

    pub fn target(mut self, target: &ResourceId) -> Self {
        self.target = Some(target.clone());
        self
    }

    pub fn payload<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            OnboardingError::Validation(format!("cannot encode request body: {e}"))
        })?;
        self.payload = Some(value);
        Ok(self)
    }

    pub fn idempotency_key(mut self, key: &str) -> Self {
        self.idempotency_key = Some(key.to_string());
        self
    }
}

/// A successful (2xx) processor response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResult {
    pub status: u16,
    pub location: Option<ResourceId>,
    pub body: Option<Value>,
}

impl ResourceResult {
    /// The address of the resource the call created, taken from `Location`.
    pub fn created(&self) -> Result<ResourceId> {
        self.location.clone().ok_or_else(|| {
            OnboardingError::TransientFailure(format!(
                "processor answered {} without a Location header",
                self.status
            ))
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBody<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssn: Option<&'a str>,
}

impl<'a> From<&'a Profile> for CustomerBody<'a> {
    fn from(profile: &'a Profile) -> Self {
        let personal = profile.is_personal();
        let identity = |field: &'a Option<String>| {
            if personal {
                field.as_deref().map(str::trim)
            } else {
                None
            }
        };
        Self {
            first_name: profile.first_name.trim(),
            last_name: profile.last_name.trim(),
            email: profile.email.trim(),
            kind: if personal { "personal" } else { "unverified" },
            phone: profile.phone.as_deref().map(str::trim),
            address1: identity(&profile.address1),
            address2: identity(&profile.address2),
            city: identity(&profile.city),
            state: identity(&profile.state),
            postal_code: identity(&profile.postal_code),
            date_of_birth: identity(&profile.date_of_birth),
            ssn: identity(&profile.ssn),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSourceBody<'a> {
    pub routing_number: &'a str,
    pub account_number: &'a str,
    pub bank_account_type: &'static str,
    pub name: &'a str,
}

impl<'a> FundingSourceBody<'a> {
    pub fn new(bank: &'a BankDetails, name: &'a str) -> Self {
        Self {
            routing_number: bank.routing_number.trim(),
            account_number: bank.account_number.trim(),
            bank_account_type: bank.account_type.as_str(),
            name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MicroDepositsBody {
    pub amount1: Money,
    pub amount2: Money,
}

impl MicroDepositsBody {
    pub fn new(amount1: Amount, amount2: Amount) -> Self {
        Self {
            amount1: amount1.into(),
            amount2: amount2.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Link<'a> {
    pub href: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TransferLinks<'a> {
    pub source: Link<'a>,
    pub destination: Link<'a>,
}

#[derive(Debug, Serialize)]
pub struct TransferBody<'a> {
    #[serde(rename = "_links")]
    pub links: TransferLinks<'a>,
    pub amount: Money,
}

impl<'a> TransferBody<'a> {
    pub fn new(source: &'a ResourceId, destination: &'a ResourceId, amount: Amount) -> Self {
        Self {
            links: TransferLinks {
                source: Link {
                    href: source.href(),
                },
                destination: Link {
                    href: destination.href(),
                },
            },
            amount: amount.into(),
        }
    }
}
