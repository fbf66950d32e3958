use crate::error::OnboardingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only currency the ACH processor settles in.
pub const USD: &str = "USD";

/// A positive monetary amount in whole cents.
///
/// Wraps `rust_decimal::Decimal` so amounts never pass through floating point.
/// At most two fractional digits are accepted; the processor rejects anything finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, OnboardingError> {
        if value <= Decimal::ZERO {
            return Err(OnboardingError::Validation(
                "Amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > 2 {
            return Err(OnboardingError::Validation(format!(
                "Amount {value} has more than two decimal places"
            )));
        }
        Ok(Self(value))
    }

    /// Parses a decimal string such as `"0.03"` or `"1.00"`.
    pub fn parse(raw: &str) -> Result<Self, OnboardingError> {
        let value = Decimal::from_str(raw.trim()).map_err(|_| {
            OnboardingError::Validation(format!("'{raw}' is not a decimal amount"))
        })?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = OnboardingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(2);
        write!(f, "{value}")
    }
}

/// Processor wire shape for money: `{"value": "1.00", "currency": "USD"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub value: String,
    pub currency: String,
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self {
            value: amount.to_string(),
            currency: USD.to_string(),
        }
    }
}
